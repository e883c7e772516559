//! Little-endian binary packing used by the token format

use crate::builder::access_token::BuildError;

/// Append-only byte writer
#[derive(Debug, Default)]
pub struct Packer {
    buf: Vec<u8>,
}

impl Packer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Length-prefixed (u16) byte string. Inputs that do not fit the prefix
    /// are rejected.
    pub fn put_bytes(&mut self, value: &[u8]) -> Result<&mut Self, BuildError> {
        let len = u16::try_from(value.len()).map_err(|_| BuildError::FieldTooLong {
            len: value.len(),
            max: u16::MAX as usize,
        })?;
        self.put_u16(len);
        self.buf.extend_from_slice(value);
        Ok(self)
    }

    pub fn put_str(&mut self, value: &str) -> Result<&mut Self, BuildError> {
        self.put_bytes(value.as_bytes())
    }

    /// Map of u16 keys to u32 values, prefixed by its entry count
    pub fn put_map<I>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (u16, u32)>,
        I::IntoIter: ExactSizeIterator,
    {
        let entries = entries.into_iter();
        self.put_u16(entries.len() as u16);
        for (key, value) in entries {
            self.put_u16(key);
            self.put_u32(value);
        }
        self
    }

    pub fn put_raw(&mut self, value: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(value);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over packed bytes
#[derive(Debug)]
pub struct Unpacker<'a> {
    data: &'a [u8],
}

impl<'a> Unpacker<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], BuildError> {
        if self.data.len() < n {
            return Err(BuildError::DecodeError(format!(
                "unexpected end of token: wanted {} bytes, {} left",
                n,
                self.data.len()
            )));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    pub fn u16(&mut self) -> Result<u16, BuildError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, BuildError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn bytes(&mut self) -> Result<&'a [u8], BuildError> {
        let len = self.u16()? as usize;
        self.take(len)
    }

    pub fn string(&mut self) -> Result<String, BuildError> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| BuildError::DecodeError(e.to_string()))
    }

    pub fn map(&mut self) -> Result<Vec<(u16, u32)>, BuildError> {
        let count = self.u16()?;
        (0..count)
            .map(|_| -> Result<(u16, u32), BuildError> { Ok((self.u16()?, self.u32()?)) })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
