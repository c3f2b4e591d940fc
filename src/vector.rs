use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::Context;
use cid::Cid;
use flate2::read::GzDecoder;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_ipld_encoding::RawBytes;
use fvm_shared::clock::ChainEpoch;
use fvm_shared::error::ExitCode;
use fvm_shared::message::Message;
use fvm_tvx_api::{RandomnessKind, RandomnessMatch, RandomnessRule};
use serde::Deserialize;

use crate::runner::VectorError;

/// The only vector class the runner executes.
pub const MESSAGE_CLASS: &str = "message";

mod base64_bytes {
    use std::borrow::Cow;

    use serde::{de, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Cow<'de, str> = Deserialize::deserialize(deserializer)?;
        base64::decode(s.as_ref()).map_err(de::Error::custom)
    }
}

// CIDs are encoded as {"/": "<cid>"}.
mod cid_json {
    use cid::Cid;
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    struct CidJson {
        #[serde(rename = "/")]
        cid: String,
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Cid, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = CidJson::deserialize(deserializer)?;
        Cid::try_from(json.cid.as_str()).map_err(de::Error::custom)
    }
}

/// A test vector, as read from its JSON file.
#[derive(Debug, Deserialize)]
pub struct MessageVector {
    pub class: String,
    #[serde(rename = "_meta", default)]
    pub meta: Option<MetaData>,
    #[serde(default)]
    pub selector: Option<Selector>,
    /// Gzipped CAR holding the pre-state (and usually the post-state).
    #[serde(with = "base64_bytes")]
    pub car: Vec<u8>,
    pub preconditions: PreConditions,
    #[serde(default)]
    pub apply_messages: Vec<ApplyMessage>,
    pub postconditions: PostConditions,
    #[serde(default)]
    pub randomness: Vec<RandomnessJson>,
}

#[derive(Debug, Deserialize)]
pub struct GenerationData {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct MetaData {
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub gen: Vec<GenerationData>,
}

#[derive(Debug, Deserialize)]
pub struct Selector {
    #[serde(default)]
    pub chaos_actor: Option<String>,
    #[serde(default)]
    pub min_protocol_version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StateTreeVector {
    #[serde(with = "cid_json")]
    pub root_cid: Cid,
}

#[derive(Debug, Deserialize)]
pub struct Variant {
    pub id: String,
    pub epoch: ChainEpoch,
    pub nv: u32,
}

#[derive(Debug, Deserialize)]
pub struct PreConditions {
    #[serde(default)]
    pub epoch: Option<ChainEpoch>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    pub state_tree: StateTreeVector,
    #[serde(default)]
    pub basefee: Option<f64>,
    #[serde(default)]
    pub circ_supply: Option<f64>,
}

impl PreConditions {
    /// The epoch of the pre-state: the explicit epoch, else the first variant's.
    pub fn base_epoch(&self) -> ChainEpoch {
        self.epoch.or_else(|| self.variants.first().map(|v| v.epoch)).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyMessage {
    /// CBOR-encoded unsigned message.
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    #[serde(default)]
    pub epoch_offset: Option<ChainEpoch>,
}

impl ApplyMessage {
    pub fn message(&self) -> anyhow::Result<Message> {
        fvm_ipld_encoding::from_slice(&self.bytes).context("failed to decode message")
    }
}

#[derive(Debug, Deserialize)]
pub struct PostConditions {
    pub state_tree: StateTreeVector,
    #[serde(default)]
    pub receipts: Vec<ReceiptVector>,
}

/// The expected receipt of one message.
#[derive(Clone, Debug, Deserialize)]
pub struct ReceiptVector {
    pub exit_code: u32,
    #[serde(rename = "return", with = "base64_bytes")]
    pub return_value: Vec<u8>,
    pub gas_used: u64,
}

impl ReceiptVector {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::new(self.exit_code)
    }

    pub fn return_data(&self) -> RawBytes {
        RawBytes::new(self.return_value.clone())
    }
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RandomnessKindJson {
    Chain,
    Beacon,
}

/// A randomness request, encoded as `[kind, dst, epoch, entropy]`.
#[derive(Debug, Deserialize_tuple)]
pub struct RandomnessRuleJson {
    pub kind: RandomnessKindJson,
    pub dst: i64,
    pub epoch: ChainEpoch,
    #[serde(with = "base64_bytes")]
    pub entropy: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct RandomnessJson {
    pub on: RandomnessRuleJson,
    #[serde(with = "base64_bytes")]
    pub ret: Vec<u8>,
}

impl MessageVector {
    pub fn from_reader(reader: impl Read) -> anyhow::Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse vector {}", path.display()))
    }

    pub fn id(&self) -> &str {
        self.meta.as_ref().map_or("", |m| m.id.as_str())
    }

    /// Decompresses the vector's CAR and writes its blocks to the store.
    /// Returns the CAR's roots.
    pub fn load_car<B: Blockstore>(&self, store: &B) -> anyhow::Result<Vec<Cid>> {
        let mut car = Vec::new();
        GzDecoder::new(self.car.as_slice())
            .read_to_end(&mut car)
            .context("failed to decompress vector CAR")?;
        let roots = futures::executor::block_on(fvm_ipld_car::load_car_unchecked(
            store,
            car.as_slice(),
        ))?;
        Ok(roots)
    }

    /// The vector's recorded randomness, in the form the VM replays it.
    pub fn recorded_randomness(&self) -> Result<Vec<RandomnessMatch>, VectorError> {
        self.randomness
            .iter()
            .map(|r| {
                let ret: [u8; 32] = r.ret.as_slice().try_into().map_err(|_| {
                    VectorError::MalformedRandomness { epoch: r.on.epoch, len: r.ret.len() }
                })?;
                let kind = match r.on.kind {
                    RandomnessKindJson::Chain => RandomnessKind::Chain,
                    RandomnessKindJson::Beacon => RandomnessKind::Beacon,
                };
                Ok(RandomnessMatch {
                    on: RandomnessRule {
                        kind,
                        dst: r.on.dst,
                        epoch: r.on.epoch,
                        entropy: r.on.entropy.clone(),
                    },
                    ret,
                })
            })
            .collect()
    }
}
