/// Block erasure codecs
///
/// Two systematic codes over equal-size symbols:
/// - Reed-Solomon over GF(2^8) with a Cauchy generator matrix. Repair row `r`,
///   source column `j` has coefficient `1 / (x_r ^ y_j)` with `x_r = k + r`
///   and `y_j = j`, so any `k` of the `k + m` symbols recover the block.
/// - Single parity (XOR), `m = 1`, recovers one lost source symbol.
///
/// Decoders keep their scratch buffers between blocks so steady-state
/// decoding does not allocate once the first block of the largest size has
/// been seen.

use super::gf256;
use super::FecScheme;
use crate::error::FecError;

/// Reed-Solomon needs `k + m` distinct field elements
pub const RS_MAX_BLOCK_LEN: usize = 255;

/// Block shape: `source_len` source symbols (k) and `repair_len` repair symbols (m)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub source_len: usize,
    pub repair_len: usize,
}

impl BlockLayout {
    pub fn new(source_len: usize, repair_len: usize) -> Self {
        Self {
            source_len,
            repair_len,
        }
    }

    pub fn block_len(&self) -> usize {
        self.source_len + self.repair_len
    }

    pub fn validate(&self, scheme: FecScheme) -> Result<(), FecError> {
        let ok = match scheme {
            FecScheme::Disabled => false,
            FecScheme::ReedSolomon => {
                self.source_len > 0 && self.repair_len > 0 && self.block_len() <= RS_MAX_BLOCK_LEN
            }
            FecScheme::Xor => self.source_len > 0 && self.repair_len == 1,
        };
        if ok {
            Ok(())
        } else {
            Err(FecError::InvalidLayout {
                source_len: self.source_len,
                repair_len: self.repair_len,
            })
        }
    }
}

/// Produces repair symbols for one block
pub trait BlockEncoder: Send {
    fn encode(
        &mut self,
        layout: BlockLayout,
        sources: &[&[u8]],
        repairs: &mut [Vec<u8>],
    ) -> Result<(), FecError>;
}

/// Restores missing source symbols of one block
pub trait BlockDecoder: Send {
    /// `symbols` holds `block_len` entries, `None` for erasures. Every
    /// missing source symbol `i` is written to `restored[i]`.
    /// Returns the number of symbols restored.
    fn decode(
        &mut self,
        layout: BlockLayout,
        symbols: &[Option<&[u8]>],
        restored: &mut [Vec<u8>],
    ) -> Result<usize, FecError>;
}

/// Common size checks; returns the symbol length
fn check_symbols(layout: BlockLayout, symbols: &[Option<&[u8]>]) -> Result<usize, FecError> {
    if symbols.len() != layout.block_len() {
        return Err(FecError::InvalidLayout {
            source_len: layout.source_len,
            repair_len: symbols.len().saturating_sub(layout.source_len),
        });
    }
    let mut symbol_len: Option<usize> = None;
    for symbol in symbols.iter().flatten() {
        match symbol_len {
            None => symbol_len = Some(symbol.len()),
            Some(expected) if expected != symbol.len() => {
                return Err(FecError::SymbolSize {
                    expected,
                    actual: symbol.len(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(symbol_len.unwrap_or(0))
}

fn check_sources(layout: BlockLayout, sources: &[&[u8]], repairs: &[Vec<u8>]) -> Result<usize, FecError> {
    if sources.len() != layout.source_len || repairs.len() != layout.repair_len {
        return Err(FecError::InvalidLayout {
            source_len: sources.len(),
            repair_len: repairs.len(),
        });
    }
    let symbol_len = sources.first().map(|s| s.len()).unwrap_or(0);
    for source in sources {
        if source.len() != symbol_len {
            return Err(FecError::SymbolSize {
                expected: symbol_len,
                actual: source.len(),
            });
        }
    }
    Ok(symbol_len)
}

#[inline]
fn cauchy(source_len: usize, row: usize, col: usize) -> u8 {
    gf256::inv(((source_len + row) as u8) ^ (col as u8))
}

#[derive(Debug, Default)]
pub struct ReedSolomonEncoder;

impl BlockEncoder for ReedSolomonEncoder {
    fn encode(
        &mut self,
        layout: BlockLayout,
        sources: &[&[u8]],
        repairs: &mut [Vec<u8>],
    ) -> Result<(), FecError> {
        layout.validate(FecScheme::ReedSolomon)?;
        let symbol_len = check_sources(layout, sources, repairs)?;
        for (row, repair) in repairs.iter_mut().enumerate() {
            repair.clear();
            repair.resize(symbol_len, 0);
            for (col, source) in sources.iter().enumerate() {
                gf256::mul_add_slice(repair, source, cauchy(layout.source_len, row, col));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ReedSolomonDecoder {
    missing: Vec<usize>,
    rows: Vec<usize>,
    matrix: Vec<u8>,
    inverse: Vec<u8>,
    syndromes: Vec<Vec<u8>>,
}

impl BlockDecoder for ReedSolomonDecoder {
    fn decode(
        &mut self,
        layout: BlockLayout,
        symbols: &[Option<&[u8]>],
        restored: &mut [Vec<u8>],
    ) -> Result<usize, FecError> {
        layout.validate(FecScheme::ReedSolomon)?;
        let symbol_len = check_symbols(layout, symbols)?;
        let k = layout.source_len;

        self.missing.clear();
        self.missing.extend((0..k).filter(|&i| symbols[i].is_none()));
        let erasures = self.missing.len();
        if erasures == 0 {
            return Ok(0);
        }
        if restored.len() < k {
            return Err(FecError::InvalidLayout {
                source_len: restored.len(),
                repair_len: layout.repair_len,
            });
        }

        self.rows.clear();
        self.rows.extend(
            (0..layout.repair_len)
                .filter(|&r| symbols[k + r].is_some())
                .take(erasures),
        );
        if self.rows.len() < erasures {
            return Err(FecError::NotEnoughSymbols {
                have: k - erasures + self.rows.len(),
                need: k,
            });
        }

        // Syndromes: repair symbols with the known sources' contribution removed
        if self.syndromes.len() < erasures {
            self.syndromes.resize_with(erasures, Vec::new);
        }
        for (t, &row) in self.rows.iter().enumerate() {
            let syndrome = &mut self.syndromes[t];
            syndrome.clear();
            syndrome.extend_from_slice(symbols[k + row].unwrap_or_default());
            for (col, source) in symbols[..k].iter().enumerate() {
                if let Some(source) = source {
                    gf256::mul_add_slice(syndrome, source, cauchy(k, row, col));
                }
            }
        }

        self.matrix.clear();
        for &row in &self.rows {
            for &col in &self.missing {
                self.matrix.push(cauchy(k, row, col));
            }
        }
        if !invert(&mut self.matrix, &mut self.inverse, erasures) {
            // Cauchy submatrices are always invertible; reaching here means a bug
            return Err(FecError::NotEnoughSymbols {
                have: k - erasures,
                need: k,
            });
        }

        for (u, &index) in self.missing.iter().enumerate() {
            let out = &mut restored[index];
            out.clear();
            out.resize(symbol_len, 0);
            for t in 0..erasures {
                gf256::mul_add_slice(out, &self.syndromes[t], self.inverse[u * erasures + t]);
            }
        }
        Ok(erasures)
    }
}

/// Gauss-Jordan inversion of an n x n row-major matrix (destroys `matrix`)
fn invert(matrix: &mut [u8], inverse: &mut Vec<u8>, n: usize) -> bool {
    inverse.clear();
    inverse.resize(n * n, 0);
    for i in 0..n {
        inverse[i * n + i] = 1;
    }

    for col in 0..n {
        let Some(pivot) = (col..n).find(|&row| matrix[row * n + col] != 0) else {
            return false;
        };
        if pivot != col {
            for c in 0..n {
                matrix.swap(pivot * n + c, col * n + c);
                inverse.swap(pivot * n + c, col * n + c);
            }
        }

        let scale = gf256::inv(matrix[col * n + col]);
        for c in 0..n {
            matrix[col * n + c] = gf256::mul(matrix[col * n + c], scale);
            inverse[col * n + c] = gf256::mul(inverse[col * n + c], scale);
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = matrix[row * n + col];
            if factor == 0 {
                continue;
            }
            for c in 0..n {
                matrix[row * n + c] ^= gf256::mul(factor, matrix[col * n + c]);
                inverse[row * n + c] ^= gf256::mul(factor, inverse[col * n + c]);
            }
        }
    }
    true
}

#[derive(Debug, Default)]
pub struct XorEncoder;

impl BlockEncoder for XorEncoder {
    fn encode(
        &mut self,
        layout: BlockLayout,
        sources: &[&[u8]],
        repairs: &mut [Vec<u8>],
    ) -> Result<(), FecError> {
        layout.validate(FecScheme::Xor)?;
        let symbol_len = check_sources(layout, sources, repairs)?;
        let parity = &mut repairs[0];
        parity.clear();
        parity.resize(symbol_len, 0);
        for source in sources {
            gf256::mul_add_slice(parity, source, 1);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct XorDecoder;

impl BlockDecoder for XorDecoder {
    fn decode(
        &mut self,
        layout: BlockLayout,
        symbols: &[Option<&[u8]>],
        restored: &mut [Vec<u8>],
    ) -> Result<usize, FecError> {
        layout.validate(FecScheme::Xor)?;
        let symbol_len = check_symbols(layout, symbols)?;
        let k = layout.source_len;

        let mut missing = (0..k).filter(|&i| symbols[i].is_none());
        let Some(index) = missing.next() else {
            return Ok(0);
        };
        let extra = missing.count();
        let Some(parity) = symbols[k] else {
            return Err(FecError::NotEnoughSymbols {
                have: k - 1 - extra,
                need: k,
            });
        };
        if extra > 0 {
            return Err(FecError::NotEnoughSymbols {
                have: k - extra,
                need: k,
            });
        }
        let Some(out) = restored.get_mut(index) else {
            return Err(FecError::InvalidLayout {
                source_len: restored.len(),
                repair_len: 1,
            });
        };

        out.clear();
        out.resize(symbol_len, 0);
        gf256::mul_add_slice(out, parity, 1);
        for source in symbols[..k].iter().flatten() {
            gf256::mul_add_slice(out, source, 1);
        }
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sources(k: usize, len: usize) -> Vec<Vec<u8>> {
        (0..k)
            .map(|i| (0..len).map(|j| (i * 31 + j * 7 + 1) as u8).collect())
            .collect()
    }

    fn encode(encoder: &mut dyn BlockEncoder, layout: BlockLayout, sources: &[Vec<u8>]) -> Vec<Vec<u8>> {
        let refs: Vec<&[u8]> = sources.iter().map(|s| s.as_slice()).collect();
        let mut repairs = vec![Vec::new(); layout.repair_len];
        encoder.encode(layout, &refs, &mut repairs).unwrap();
        repairs
    }

    fn symbols_with_losses<'a>(
        sources: &'a [Vec<u8>],
        repairs: &'a [Vec<u8>],
        lost: &[usize],
    ) -> Vec<Option<&'a [u8]>> {
        sources
            .iter()
            .chain(repairs.iter())
            .enumerate()
            .map(|(i, s)| if lost.contains(&i) { None } else { Some(s.as_slice()) })
            .collect()
    }

    #[test]
    fn test_rs_recovers_two_of_four() {
        let layout = BlockLayout::new(4, 2);
        let sources = make_sources(4, 32);
        let repairs = encode(&mut ReedSolomonEncoder, layout, &sources);

        for a in 0..4 {
            for b in (a + 1)..4 {
                let symbols = symbols_with_losses(&sources, &repairs, &[a, b]);
                let mut restored = vec![Vec::new(); 4];
                let n = ReedSolomonDecoder::default()
                    .decode(layout, &symbols, &mut restored)
                    .unwrap();
                assert_eq!(n, 2);
                assert_eq!(restored[a], sources[a], "lost {} and {}", a, b);
                assert_eq!(restored[b], sources[b], "lost {} and {}", a, b);
            }
        }
    }

    #[test]
    fn test_rs_three_losses_not_enough() {
        let layout = BlockLayout::new(4, 2);
        let sources = make_sources(4, 16);
        let repairs = encode(&mut ReedSolomonEncoder, layout, &sources);
        let symbols = symbols_with_losses(&sources, &repairs, &[0, 1, 2]);
        let mut restored = vec![Vec::new(); 4];
        assert_eq!(
            ReedSolomonDecoder::default().decode(layout, &symbols, &mut restored),
            Err(FecError::NotEnoughSymbols { have: 3, need: 4 })
        );
    }

    #[test]
    fn test_rs_nothing_missing() {
        let layout = BlockLayout::new(3, 1);
        let sources = make_sources(3, 8);
        let repairs = encode(&mut ReedSolomonEncoder, layout, &sources);
        let symbols = symbols_with_losses(&sources, &repairs, &[3]);
        let mut restored = vec![Vec::new(); 3];
        assert_eq!(ReedSolomonDecoder::default().decode(layout, &symbols, &mut restored), Ok(0));
    }

    #[test]
    fn test_rs_symbol_size_mismatch() {
        let layout = BlockLayout::new(2, 1);
        let a = vec![1u8; 4];
        let b = vec![1u8; 5];
        let symbols = vec![Some(a.as_slice()), None, Some(b.as_slice())];
        let mut restored = vec![Vec::new(); 2];
        assert!(matches!(
            ReedSolomonDecoder::default().decode(layout, &symbols, &mut restored),
            Err(FecError::SymbolSize { .. })
        ));
    }

    #[test]
    fn test_xor_recovers_one() {
        let layout = BlockLayout::new(5, 1);
        let sources = make_sources(5, 20);
        let repairs = encode(&mut XorEncoder, layout, &sources);
        let symbols = symbols_with_losses(&sources, &repairs, &[3]);
        let mut restored = vec![Vec::new(); 5];
        assert_eq!(XorDecoder.decode(layout, &symbols, &mut restored), Ok(1));
        assert_eq!(restored[3], sources[3]);
    }

    #[test]
    fn test_xor_two_losses_fail() {
        let layout = BlockLayout::new(5, 1);
        let sources = make_sources(5, 20);
        let repairs = encode(&mut XorEncoder, layout, &sources);
        let symbols = symbols_with_losses(&sources, &repairs, &[1, 3]);
        let mut restored = vec![Vec::new(); 5];
        assert!(XorDecoder.decode(layout, &symbols, &mut restored).is_err());
    }

    #[test]
    fn test_layout_validation() {
        assert!(BlockLayout::new(4, 2).validate(FecScheme::ReedSolomon).is_ok());
        assert!(BlockLayout::new(200, 55).validate(FecScheme::ReedSolomon).is_ok());
        assert!(BlockLayout::new(200, 56).validate(FecScheme::ReedSolomon).is_err());
        assert!(BlockLayout::new(0, 2).validate(FecScheme::ReedSolomon).is_err());
        assert!(BlockLayout::new(4, 2).validate(FecScheme::Xor).is_err());
        assert!(BlockLayout::new(4, 1).validate(FecScheme::Xor).is_ok());
        assert!(BlockLayout::new(4, 1).validate(FecScheme::Disabled).is_err());
    }

    #[test]
    fn test_decoder_reuse_across_block_sizes() {
        let mut decoder = ReedSolomonDecoder::default();
        for (k, m) in [(10, 4), (4, 2), (10, 4)] {
            let layout = BlockLayout::new(k, m);
            let sources = make_sources(k, 12);
            let repairs = encode(&mut ReedSolomonEncoder, layout, &sources);
            let lost: Vec<usize> = (0..m).collect();
            let symbols = symbols_with_losses(&sources, &repairs, &lost);
            let mut restored = vec![Vec::new(); k];
            decoder.decode(layout, &symbols, &mut restored).unwrap();
            for i in &lost {
                assert_eq!(restored[*i], sources[*i]);
            }
        }
    }
}
