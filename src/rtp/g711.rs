/// G.711 u-law (PCMU) and A-law (PCMA) payload decoding
///
/// One byte per sample, mono, 8 kHz. Decoding is a table lookup straight
/// into the output frame.
///
/// The tables follow ITU-T G.711 (1988), https://www.itu.int/rec/T-REC-G.711,
/// cross-checked against zaf/g711 (MIT) and the Sun reference implementation.

use super::PayloadDecoder;
use crate::audio::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum G711Codec {
    ULaw, // PCMU - payload type 0
    ALaw, // PCMA - payload type 8
}

#[derive(Debug, Clone, Copy)]
pub struct G711Decoder {
    codec: G711Codec,
}

/// u-law to 16-bit linear PCM (256 entries, ITU-T G.711 Appendix I)
#[rustfmt::skip]
const ULAW_TO_PCM: [i16; 256] = [
    -32124, -31100, -30076, -29052, -28028, -27004, -25980, -24956,
    -23932, -22908, -21884, -20860, -19836, -18812, -17788, -16764,
    -15996, -15484, -14972, -14460, -13948, -13436, -12924, -12412,
    -11900, -11388, -10876, -10364,  -9852,  -9340,  -8828,  -8316,
     -7932,  -7676,  -7420,  -7164,  -6908,  -6652,  -6396,  -6140,
     -5884,  -5628,  -5372,  -5116,  -4860,  -4604,  -4348,  -4092,
     -3900,  -3772,  -3644,  -3516,  -3388,  -3260,  -3132,  -3004,
     -2876,  -2748,  -2620,  -2492,  -2364,  -2236,  -2108,  -1980,
     -1884,  -1820,  -1756,  -1692,  -1628,  -1564,  -1500,  -1436,
     -1372,  -1308,  -1244,  -1180,  -1116,  -1052,   -988,   -924,
      -876,   -844,   -812,   -780,   -748,   -716,   -684,   -652,
      -620,   -588,   -556,   -524,   -492,   -460,   -428,   -396,
      -372,   -356,   -340,   -324,   -308,   -292,   -276,   -260,
      -244,   -228,   -212,   -196,   -180,   -164,   -148,   -132,
      -120,   -112,   -104,    -96,    -88,    -80,    -72,    -64,
       -56,    -48,    -40,    -32,    -24,    -16,     -8,      0,
     32124,  31100,  30076,  29052,  28028,  27004,  25980,  24956,
     23932,  22908,  21884,  20860,  19836,  18812,  17788,  16764,
     15996,  15484,  14972,  14460,  13948,  13436,  12924,  12412,
     11900,  11388,  10876,  10364,   9852,   9340,   8828,   8316,
      7932,   7676,   7420,   7164,   6908,   6652,   6396,   6140,
      5884,   5628,   5372,   5116,   4860,   4604,   4348,   4092,
      3900,   3772,   3644,   3516,   3388,   3260,   3132,   3004,
      2876,   2748,   2620,   2492,   2364,   2236,   2108,   1980,
      1884,   1820,   1756,   1692,   1628,   1564,   1500,   1436,
      1372,   1308,   1244,   1180,   1116,   1052,    988,    924,
       876,    844,    812,    780,    748,    716,    684,    652,
       620,    588,    556,    524,    492,    460,    428,    396,
       372,    356,    340,    324,    308,    292,    276,    260,
       244,    228,    212,    196,    180,    164,    148,    132,
       120,    112,    104,     96,     88,     80,     72,     64,
        56,     48,     40,     32,     24,     16,      8,      0,
];

/// A-law to 16-bit linear PCM (256 entries, ITU-T G.711 Appendix II)
#[rustfmt::skip]
const ALAW_TO_PCM: [i16; 256] = [
     -5504,  -5248,  -6016,  -5760,  -4480,  -4224,  -4992,  -4736,
     -7552,  -7296,  -8064,  -7808,  -6528,  -6272,  -7040,  -6784,
     -2752,  -2624,  -3008,  -2880,  -2240,  -2112,  -2496,  -2368,
     -3776,  -3648,  -4032,  -3904,  -3264,  -3136,  -3520,  -3392,
    -22016, -20992, -24064, -23040, -17920, -16896, -19968, -18944,
    -30208, -29184, -32256, -31232, -26112, -25088, -28160, -27136,
    -11008, -10496, -12032, -11520,  -8960,  -8448,  -9984,  -9472,
    -15104, -14592, -16128, -15616, -13056, -12544, -14080, -13568,
      -344,   -328,   -376,   -360,   -280,   -264,   -312,   -296,
      -472,   -456,   -504,   -488,   -408,   -392,   -440,   -424,
       -88,    -72,   -120,   -104,    -24,     -8,    -56,    -40,
      -216,   -200,   -248,   -232,   -152,   -136,   -184,   -168,
     -1376,  -1312,  -1504,  -1440,  -1120,  -1056,  -1248,  -1184,
     -1888,  -1824,  -2016,  -1952,  -1632,  -1568,  -1760,  -1696,
      -688,   -656,   -752,   -720,   -560,   -528,   -624,   -592,
      -944,   -912,  -1008,   -976,   -816,   -784,   -880,   -848,
      5504,   5248,   6016,   5760,   4480,   4224,   4992,   4736,
      7552,   7296,   8064,   7808,   6528,   6272,   7040,   6784,
      2752,   2624,   3008,   2880,   2240,   2112,   2496,   2368,
      3776,   3648,   4032,   3904,   3264,   3136,   3520,   3392,
     22016,  20992,  24064,  23040,  17920,  16896,  19968,  18944,
     30208,  29184,  32256,  31232,  26112,  25088,  28160,  27136,
     11008,  10496,  12032,  11520,   8960,   8448,   9984,   9472,
     15104,  14592,  16128,  15616,  13056,  12544,  14080,  13568,
       344,    328,    376,    360,    280,    264,    312,    296,
       472,    456,    504,    488,    408,    392,    440,    424,
        88,     72,    120,    104,     24,      8,     56,     40,
       216,    200,    248,    232,    152,    136,    184,    168,
      1376,   1312,   1504,   1440,   1120,   1056,   1248,   1184,
      1888,   1824,   2016,   1952,   1632,   1568,   1760,   1696,
       688,    656,    752,    720,    560,    528,    624,    592,
       944,    912,   1008,    976,    816,    784,    880,    848,
];

impl G711Decoder {
    pub fn new(codec: G711Codec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> G711Codec {
        self.codec
    }

    #[inline]
    pub fn decode_sample(&self, byte: u8) -> i16 {
        match self.codec {
            G711Codec::ULaw => ULAW_TO_PCM[byte as usize],
            G711Codec::ALaw => ALAW_TO_PCM[byte as usize],
        }
    }

    /// Decode bytes into normalized samples, returns samples written
    #[inline]
    pub fn decode_into(&self, data: &[u8], out: &mut [Sample]) -> usize {
        let table = match self.codec {
            G711Codec::ULaw => &ULAW_TO_PCM,
            G711Codec::ALaw => &ALAW_TO_PCM,
        };
        let n = data.len().min(out.len());
        for (dst, &byte) in out[..n].iter_mut().zip(data) {
            *dst = table[byte as usize] as Sample / 32768.0;
        }
        n
    }
}

impl PayloadDecoder for G711Decoder {
    fn samples_in(&self, payload_len: usize) -> usize {
        payload_len
    }

    fn decode(&mut self, payload: &[u8], offset: usize, out: &mut [Sample]) -> usize {
        match payload.get(offset..) {
            Some(rest) => self.decode_into(rest, out),
            None => 0,
        }
    }
}



/// Kani formal verification proofs
/// Run with: cargo kani --tests
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    /// Proves: table lookup never panics for any byte
    #[kani::proof]
    fn decode_sample_never_panics() {
        let byte: u8 = kani::any();
        let _ = G711Decoder::new(G711Codec::ULaw).decode_sample(byte);
        let _ = G711Decoder::new(G711Codec::ALaw).decode_sample(byte);
    }

    /// Proves: A-law symmetry for all indices
    #[kani::proof]
    fn alaw_symmetry_proof() {
        let i: u8 = kani::any();
        kani::assume(i < 128);
        kani::assert(
            ALAW_TO_PCM[i as usize] == -ALAW_TO_PCM[(i + 128) as usize],
            "A-law must be symmetric",
        );
    }
}
