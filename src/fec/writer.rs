use tracing::trace;

use super::codec::{BlockEncoder, BlockLayout};
use super::header::{compose_repair, compose_source};
use super::FecScheme;
use crate::error::FecError;
use crate::packet::Blknum;

/// Datagrams produced for one RTP packet
#[derive(Debug, Default)]
pub struct WriterOutput {
    /// The RTP packet with its FEC source footer
    pub source: Vec<u8>,
    /// Repair datagrams, non-empty when this packet closed a block
    pub repairs: Vec<Vec<u8>>,
}

/// Sender side of the FEC scheme
///
/// Groups consecutive RTP packets into blocks of `k`, tags each with its
/// payload ID and emits `m` repair packets after the last source packet of
/// the block. All RTP packets of one block must have the same size.
pub struct FecWriter {
    encoder: Box<dyn BlockEncoder>,
    layout: BlockLayout,
    sbn: Blknum,
    sources: Vec<Vec<u8>>,
    repairs: Vec<Vec<u8>>,
}

impl FecWriter {
    pub fn new(scheme: FecScheme, layout: BlockLayout) -> Result<Self, FecError> {
        layout.validate(scheme)?;
        let encoder = scheme.new_encoder().ok_or(FecError::InvalidLayout {
            source_len: layout.source_len,
            repair_len: layout.repair_len,
        })?;
        Ok(Self {
            encoder,
            layout,
            sbn: 0,
            sources: Vec::with_capacity(layout.source_len),
            repairs: vec![Vec::new(); layout.repair_len],
        })
    }

    /// Start numbering blocks from `sbn`
    pub fn with_first_block(mut self, sbn: Blknum) -> Self {
        self.sbn = sbn;
        self
    }

    pub fn write(&mut self, rtp: &[u8]) -> Result<WriterOutput, FecError> {
        let k = self.layout.source_len as u16;
        let n = self.layout.block_len() as u16;
        let esi = self.sources.len() as u16;

        let mut output = WriterOutput {
            source: compose_source(rtp, self.sbn, esi, k),
            repairs: Vec::new(),
        };
        self.sources.push(rtp.to_vec());

        if self.sources.len() == self.layout.source_len {
            let refs: Vec<&[u8]> = self.sources.iter().map(|s| s.as_slice()).collect();
            let result = self.encoder.encode(self.layout, &refs, &mut self.repairs);
            self.sources.clear();
            result?;

            for (i, symbol) in self.repairs.iter().enumerate() {
                output
                    .repairs
                    .push(compose_repair(self.sbn, k + i as u16, k, n, symbol));
            }
            trace!("fec writer: finished block {}", self.sbn);
            self.sbn = self.sbn.wrapping_add(1);
        }
        Ok(output)
    }
}
