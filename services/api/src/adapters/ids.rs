//! services/api/src/adapters/ids.rs
//!
//! Obfuscates numeric timetable ids before they leave the service.

use sqids::Sqids;
use timetable_core::TimetableId;

#[derive(Debug, thiserror::Error)]
pub enum IdCodecError {
    #[error("Invalid id alphabet configuration: {0}")]
    Config(#[from] sqids::Error),
    #[error("Timetable id {0} cannot be encoded")]
    Unencodable(TimetableId),
}

pub struct TimetableIdCodec {
    sqids: Sqids,
}

impl TimetableIdCodec {
    pub fn new(alphabet: Option<&str>, min_length: u8) -> Result<Self, IdCodecError> {
        let mut builder = Sqids::builder().min_length(min_length);
        if let Some(alphabet) = alphabet {
            builder = builder.alphabet(alphabet.chars().collect());
        }
        Ok(Self {
            sqids: builder.build()?,
        })
    }

    pub fn encode(&self, id: TimetableId) -> Result<String, IdCodecError> {
        let raw = u64::try_from(id).map_err(|_| IdCodecError::Unencodable(id))?;
        self.sqids
            .encode(&[raw])
            .map_err(|_| IdCodecError::Unencodable(id))
    }

    /// Returns `None` for anything that is not the canonical encoding of a
    /// single id.
    pub fn decode(&self, encoded: &str) -> Option<TimetableId> {
        let &[raw] = self.sqids.decode(encoded).as_slice() else {
            return None;
        };
        let id = TimetableId::try_from(raw).ok()?;
        match self.encode(id) {
            Ok(canonical) if canonical == encoded => Some(id),
            _ => None,
        }
    }
}
