use super::accumulator::Accumulator;
use super::{HIDDEN_SIZE, INPUT_SIZE, OUTPUT_BUCKETS, QA, QB, SCALE};
use crate::board::Color;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use tracing::info;

/// Network parameters, immutable after load.
///
/// The weights file is a bare little-endian i16 concatenation in this exact
/// field order; the dimensions are compile-time constants and must match the
/// file.
#[derive(Debug)]
pub struct NnueNetwork {
    /// Feature transformer, `[INPUT_SIZE][HIDDEN_SIZE]`.
    pub hidden_weights: Box<[[i16; HIDDEN_SIZE]; INPUT_SIZE]>,
    /// Feature transformer biases.
    pub hidden_biases: Box<[i16; HIDDEN_SIZE]>,
    /// Output weights applied to the side-to-move accumulator, per bucket.
    pub output_weights_stm: Box<[[i16; HIDDEN_SIZE]; OUTPUT_BUCKETS]>,
    /// Output weights applied to the opponent accumulator, per bucket.
    pub output_weights_opp: Box<[[i16; HIDDEN_SIZE]; OUTPUT_BUCKETS]>,
    /// Output bias per bucket.
    pub output_bias: [i16; OUTPUT_BUCKETS],
}

fn read_i16s<R: Read>(reader: &mut R, out: &mut [i16]) -> std::io::Result<()> {
    let mut buf = [0u8; 2];
    for v in out.iter_mut() {
        reader.read_exact(&mut buf)?;
        *v = i16::from_le_bytes(buf);
    }
    Ok(())
}

impl NnueNetwork {
    /// Load parameters from a weights file.
    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let net = Self::from_reader(&mut reader)?;
        info!(path = %path.as_ref().display(), "network weights loaded");
        Ok(net)
    }

    /// Load parameters from an in-memory byte slice.
    pub fn from_bytes(data: &[u8]) -> std::io::Result<Self> {
        Self::from_reader(&mut Cursor::new(data))
    }

    pub fn from_reader<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut net = Self::zeroed();

        for row in net.hidden_weights.iter_mut() {
            read_i16s(reader, row)?;
        }
        read_i16s(reader, &mut *net.hidden_biases)?;
        for row in net.output_weights_stm.iter_mut() {
            read_i16s(reader, row)?;
        }
        for row in net.output_weights_opp.iter_mut() {
            read_i16s(reader, row)?;
        }
        read_i16s(reader, &mut net.output_bias)?;

        Ok(net)
    }

    /// An all-zero network. Every position evaluates to 0, which keeps the
    /// move generator and search exercisable without a weights file.
    pub fn zeroed() -> Self {
        NnueNetwork {
            hidden_weights: vec![[0i16; HIDDEN_SIZE]; INPUT_SIZE]
                .into_boxed_slice()
                .try_into()
                .unwrap(),
            hidden_biases: Box::new([0i16; HIDDEN_SIZE]),
            output_weights_stm: Box::new([[0i16; HIDDEN_SIZE]; OUTPUT_BUCKETS]),
            output_weights_opp: Box::new([[0i16; HIDDEN_SIZE]; OUTPUT_BUCKETS]),
            output_bias: [0i16; OUTPUT_BUCKETS],
        }
    }

    /// Evaluate from the side-to-move perspective, in centipawn-like units.
    ///
    /// Activation is clipped ReLU: each accumulator lane is clamped to
    /// [0, QA] before the per-bucket dot product.
    pub fn evaluate(&self, acc: &Accumulator, side_to_move: Color, bucket: usize) -> i32 {
        debug_assert!(bucket < OUTPUT_BUCKETS);
        let acc_stm = acc.perspective(side_to_move);
        let acc_opp = acc.perspective(side_to_move.opposite());
        let w_stm = &self.output_weights_stm[bucket];
        let w_opp = &self.output_weights_opp[bucket];

        let mut output = i32::from(self.output_bias[bucket]);
        for i in 0..HIDDEN_SIZE {
            output += (i32::from(acc_stm[i])).clamp(0, QA) * i32::from(w_stm[i]);
            output += (i32::from(acc_opp[i])).clamp(0, QA) * i32::from(w_opp[i]);
        }

        output * SCALE / (QA * QB)
    }
}
