use byteorder::{ByteOrder, LittleEndian};

/// A read that ran past the end of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Short {
    pub needed: usize,
    pub remaining: usize,
}

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos.min(self.buf.len())..]
    }

    fn need(&self, n: usize) -> Result<(), Short> {
        if self.remaining() < n {
            return Err(Short {
                needed: n,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn advance(&mut self, n: usize) -> Result<(), Short> {
        self.need(n)?;
        self.pos += n;
        Ok(())
    }

    pub fn get_u32(&mut self) -> Result<u32, Short> {
        self.need(4)?;
        let v = LittleEndian::read_u32(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(v)
    }

    pub fn get_i32(&mut self) -> Result<i32, Short> {
        self.need(4)?;
        let v = LittleEndian::read_i32(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(v)
    }

    pub fn get_u64(&mut self) -> Result<u64, Short> {
        self.need(8)?;
        let v = LittleEndian::read_u64(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(v)
    }

    pub fn get_i64(&mut self) -> Result<i64, Short> {
        self.need(8)?;
        let v = LittleEndian::read_i64(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(v)
    }

    pub fn get_f32(&mut self) -> Result<f32, Short> {
        self.need(4)?;
        let v = LittleEndian::read_f32(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(v)
    }

    pub fn get_f64(&mut self) -> Result<f64, Short> {
        self.need(8)?;
        let v = LittleEndian::read_f64(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(v)
    }

    pub fn get_bytes(&mut self, n: usize) -> Result<&'a [u8], Short> {
        self.need(n)?;
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }
}
