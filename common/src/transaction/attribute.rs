use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use serde::{Deserialize, Serialize};

// Transaction attribute, a forward-compatible extension point.
//
// No usage kinds are defined by the current protocol: the enumeration is
// structurally present but empty, so the payload round-trips untouched and
// nothing in the node assigns it a meaning. Defining a first usage is a
// protocol upgrade, not a code refactor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    usage: u8,
    #[serde(with = "hex")]
    data: Vec<u8>,
}

impl Attribute {
    pub fn new(usage: u8, data: Vec<u8>) -> Self {
        Attribute { usage, data }
    }

    #[inline]
    pub fn get_usage(&self) -> u8 {
        self.usage
    }

    #[inline]
    pub fn get_data(&self) -> &[u8] {
        &self.data
    }
}

impl Serializer for Attribute {
    fn write(&self, writer: &mut Writer) {
        self.usage.write(writer);
        self.data.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<Attribute, ReaderError> {
        let usage = u8::read(reader)?;
        let data = Vec::read(reader)?;
        Ok(Attribute { usage, data })
    }

    fn size(&self) -> usize {
        self.usage.size() + self.data.size()
    }
}
