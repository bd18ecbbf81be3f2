use serde::{Deserialize, Serialize};
use serde_json::Map;

/// A lowercase hexadecimal digest string.
pub type HexString = String;

/// Opaque structured payload — a JSON object the core never interprets.
/// Used for `transaction_data` and `document_hashes`.
pub type JsonMap = Map<String, serde_json::Value>;

/// The closed set of supply-chain event tags a transaction may carry.
///
/// Closed by design: adding a new stage of the supply chain means adding a
/// variant here *and* a matching arm in `Stage::from`, not accepting an
/// open string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    BatchCreate,
    HarvestRecord,
    CollectionRecord,
    TransportStart,
    TransportEnd,
    DryingRecord,
    GradingRecord,
    PackingRecord,
    DistributionCollect,
    DistributionComplete,
    ExportCollect,
    ExportRecord,
}

impl TransactionType {
    /// The wire tag exactly as it appears in canonical JSON and storage.
    pub fn as_tag(&self) -> &'static str {
        match self {
            TransactionType::BatchCreate => "BATCH_CREATE",
            TransactionType::HarvestRecord => "HARVEST_RECORD",
            TransactionType::CollectionRecord => "COLLECTION_RECORD",
            TransactionType::TransportStart => "TRANSPORT_START",
            TransactionType::TransportEnd => "TRANSPORT_END",
            TransactionType::DryingRecord => "DRYING_RECORD",
            TransactionType::GradingRecord => "GRADING_RECORD",
            TransactionType::PackingRecord => "PACKING_RECORD",
            TransactionType::DistributionCollect => "DISTRIBUTION_COLLECT",
            TransactionType::DistributionComplete => "DISTRIBUTION_COMPLETE",
            TransactionType::ExportCollect => "EXPORT_COLLECT",
            TransactionType::ExportRecord => "EXPORT_RECORD",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "BATCH_CREATE" => TransactionType::BatchCreate,
            "HARVEST_RECORD" => TransactionType::HarvestRecord,
            "COLLECTION_RECORD" => TransactionType::CollectionRecord,
            "TRANSPORT_START" => TransactionType::TransportStart,
            "TRANSPORT_END" => TransactionType::TransportEnd,
            "DRYING_RECORD" => TransactionType::DryingRecord,
            "GRADING_RECORD" => TransactionType::GradingRecord,
            "PACKING_RECORD" => TransactionType::PackingRecord,
            "DISTRIBUTION_COLLECT" => TransactionType::DistributionCollect,
            "DISTRIBUTION_COMPLETE" => TransactionType::DistributionComplete,
            "EXPORT_COLLECT" => TransactionType::ExportCollect,
            "EXPORT_RECORD" => TransactionType::ExportRecord,
            _ => return None,
        })
    }
}

/// The coarse phase label attached to a `batch_refs` row, derived from
/// `TransactionType`. Every `TransactionType` variant maps to exactly one
/// stage — there is no catch-all arm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Cultivation,
    Harvest,
    Collection,
    Transport,
    Process,
    Distribute,
    Export,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Cultivation => "cultivation",
            Stage::Harvest => "harvest",
            Stage::Collection => "collection",
            Stage::Transport => "transport",
            Stage::Process => "process",
            Stage::Distribute => "distribute",
            Stage::Export => "export",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "cultivation" => Stage::Cultivation,
            "harvest" => Stage::Harvest,
            "collection" => Stage::Collection,
            "transport" => Stage::Transport,
            "process" => Stage::Process,
            "distribute" => Stage::Distribute,
            "export" => Stage::Export,
            _ => return None,
        })
    }
}

impl From<TransactionType> for Stage {
    fn from(t: TransactionType) -> Self {
        match t {
            TransactionType::BatchCreate => Stage::Cultivation,
            TransactionType::HarvestRecord => Stage::Harvest,
            TransactionType::CollectionRecord => Stage::Collection,
            TransactionType::TransportStart => Stage::Transport,
            TransactionType::TransportEnd => Stage::Transport,
            TransactionType::DryingRecord => Stage::Process,
            TransactionType::GradingRecord => Stage::Process,
            TransactionType::PackingRecord => Stage::Process,
            TransactionType::DistributionCollect => Stage::Distribute,
            TransactionType::DistributionComplete => Stage::Distribute,
            TransactionType::ExportCollect => Stage::Export,
            TransactionType::ExportRecord => Stage::Export,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip_covers_every_variant() {
        let all = [
            TransactionType::BatchCreate,
            TransactionType::HarvestRecord,
            TransactionType::CollectionRecord,
            TransactionType::TransportStart,
            TransactionType::TransportEnd,
            TransactionType::DryingRecord,
            TransactionType::GradingRecord,
            TransactionType::PackingRecord,
            TransactionType::DistributionCollect,
            TransactionType::DistributionComplete,
            TransactionType::ExportCollect,
            TransactionType::ExportRecord,
        ];
        for t in all {
            let tag = t.as_tag();
            assert_eq!(TransactionType::from_tag(tag), Some(t));
        }
    }

    #[test]
    fn every_transaction_type_has_a_stage() {
        assert_eq!(Stage::from(TransactionType::BatchCreate), Stage::Cultivation);
        assert_eq!(Stage::from(TransactionType::ExportRecord), Stage::Export);
    }
}
