//! Partitioned FFT convolution
//!
//! Uniformly-partitioned overlap-save convolution: the impulse response is
//! split into `block`-sized partitions whose spectra are multiplied against
//! a frequency-domain delay line of past input blocks. Cost per block is one
//! forward and one inverse FFT of size `2 * block` plus a complex
//! multiply-accumulate per partition.
//!
//! [`PartitionedConvolver`] works on whole blocks. [`StreamingConvolver`]
//! accepts arbitrary slice lengths at the cost of one block of latency.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{Result, SonoscapeError};

/// Block-based convolver for one channel
pub struct PartitionedConvolver {
    block: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    /// Spectra of the IR partitions, each `2 * block` long
    partitions: Vec<Vec<Complex<f32>>>,
    /// Spectra of recent input blocks; `delay_pos` holds the newest
    delay_line: Vec<Vec<Complex<f32>>>,
    delay_pos: usize,
    /// Previous and current input block
    history: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    accumulator: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl fmt::Debug for PartitionedConvolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionedConvolver")
            .field("block", &self.block)
            .field("partitions", &self.partitions.len())
            .finish()
    }
}

impl PartitionedConvolver {
    /// Prepare a convolver for `impulse` with partitions of `block` samples
    ///
    /// # Errors
    /// * `InvalidParameter` - If `block` is zero
    pub fn new(impulse: &[f32], block: usize) -> Result<Self> {
        if block == 0 {
            return Err(SonoscapeError::invalid_parameter(
                "convolution_block",
                block,
                "> 0",
            ));
        }

        let size = block * 2;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let ifft = planner.plan_fft_inverse(size);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());
        let mut scratch = vec![Complex::new(0.0, 0.0); scratch_len];

        let count = impulse.len().div_ceil(block).max(1);
        let mut partitions = Vec::with_capacity(count);
        for index in 0..count {
            let mut spectrum = vec![Complex::new(0.0, 0.0); size];
            let start = (index * block).min(impulse.len());
            let end = ((index + 1) * block).min(impulse.len());
            for (dst, &src) in spectrum.iter_mut().zip(&impulse[start..end]) {
                dst.re = src;
            }
            fft.process_with_scratch(&mut spectrum, &mut scratch);
            partitions.push(spectrum);
        }

        Ok(Self {
            block,
            fft,
            ifft,
            delay_line: vec![vec![Complex::new(0.0, 0.0); size]; count],
            partitions,
            delay_pos: 0,
            history: vec![0.0; size],
            spectrum: vec![Complex::new(0.0, 0.0); size],
            accumulator: vec![Complex::new(0.0, 0.0); size],
            scratch,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block
    }

    /// Number of IR partitions
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Clear all input history
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        for spectrum in &mut self.delay_line {
            spectrum.fill(Complex::new(0.0, 0.0));
        }
        self.delay_pos = 0;
    }

    /// Convolve one block
    ///
    /// `input` and `output` must both be exactly `block_size()` long; shorter
    /// input is zero-padded and output beyond `block_size()` is left alone.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        let block = self.block;
        let size = block * 2;

        self.history.copy_within(block.., 0);
        let incoming = input.len().min(block);
        self.history[block..block + incoming].copy_from_slice(&input[..incoming]);
        self.history[block + incoming..].fill(0.0);

        for (dst, &src) in self.spectrum.iter_mut().zip(&self.history) {
            *dst = Complex::new(src, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let count = self.partitions.len();
        self.delay_pos = (self.delay_pos + count - 1) % count;
        self.delay_line[self.delay_pos].copy_from_slice(&self.spectrum);

        self.accumulator.fill(Complex::new(0.0, 0.0));
        for (k, partition) in self.partitions.iter().enumerate() {
            let past = &self.delay_line[(self.delay_pos + k) % count];
            for ((acc, x), h) in self.accumulator.iter_mut().zip(past).zip(partition) {
                *acc += x * h;
            }
        }

        self.ifft
            .process_with_scratch(&mut self.accumulator, &mut self.scratch);

        let norm = 1.0 / size as f32;
        let produced = output.len().min(block);
        for (dst, src) in output[..produced]
            .iter_mut()
            .zip(&self.accumulator[block..])
        {
            *dst = src.re * norm;
        }
    }

    /// Convolve a whole signal, returning exactly `input.len()` samples
    ///
    /// The tail past the end of the input is discarded.
    pub fn convolve(&mut self, input: &[f32]) -> Vec<f32> {
        let mut output = vec![0.0; input.len()];
        let mut block_out = vec![0.0; self.block];
        for (chunk_in, chunk_out) in input.chunks(self.block).zip(output.chunks_mut(self.block)) {
            self.process_block(chunk_in, &mut block_out);
            chunk_out.copy_from_slice(&block_out[..chunk_out.len()]);
        }
        output
    }
}

/// Convolver accepting arbitrary slice lengths
///
/// Output lags input by one block.
#[derive(Debug)]
pub struct StreamingConvolver {
    inner: PartitionedConvolver,
    pending_in: Vec<f32>,
    pending_out: VecDeque<f32>,
    block_out: Vec<f32>,
}

impl StreamingConvolver {
    pub fn new(impulse: &[f32], block: usize) -> Result<Self> {
        let inner = PartitionedConvolver::new(impulse, block)?;
        Ok(Self {
            pending_in: Vec::with_capacity(block),
            pending_out: std::iter::repeat(0.0).take(block).collect(),
            block_out: vec![0.0; block],
            inner,
        })
    }

    /// Latency in samples
    pub fn latency(&self) -> usize {
        self.inner.block_size()
    }

    pub fn reset(&mut self) {
        let block = self.inner.block_size();
        self.inner.reset();
        self.pending_in.clear();
        self.pending_out.clear();
        self.pending_out.extend(std::iter::repeat(0.0).take(block));
    }

    /// Push `input` and write the same number of samples to `output`
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let block = self.inner.block_size();
        for (x, y) in input.iter().zip(output.iter_mut()) {
            self.pending_in.push(*x);
            if self.pending_in.len() == block {
                self.inner
                    .process_block(&self.pending_in, &mut self.block_out);
                self.pending_out.extend(self.block_out.iter().copied());
                self.pending_in.clear();
            }
            *y = self.pending_out.pop_front().unwrap_or(0.0);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    fn direct_convolution(input: &[f32], impulse: &[f32]) -> Vec<f32> {
        (0..input.len())
            .map(|n| {
                impulse
                    .iter()
                    .enumerate()
                    .filter(|(k, _)| *k <= n)
                    .map(|(k, h)| h * input[n - k])
                    .sum()
            })
            .collect()
    }

    fn test_signal(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| ((i as f32 * 0.37).sin() + (i as f32 * 0.11).cos()) * 0.5)
            .collect()
    }

    #[test_case(16, 5 ; "ir shorter than block")]
    #[test_case(16, 16 ; "ir equals block")]
    #[test_case(8, 37 ; "many partitions")]
    #[test_case(64, 300 ; "partial last partition")]
    fn test_matches_direct_convolution(block: usize, ir_len: usize) {
        let impulse: Vec<f32> = (0..ir_len).map(|i| 0.9f32.powi(i as i32) * if i % 2 == 0 { 1.0 } else { -0.5 }).collect();
        let input = test_signal(203);

        let mut convolver = PartitionedConvolver::new(&impulse, block).unwrap();
        let fast = convolver.convolve(&input);
        let slow = direct_convolution(&input, &impulse);

        assert_eq!(fast.len(), input.len());
        for (a, b) in fast.iter().zip(&slow) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_identity_impulse() {
        let input = test_signal(100);
        let mut convolver = PartitionedConvolver::new(&[1.0], 32).unwrap();
        let out = convolver.convolve(&input);
        for (a, b) in out.iter().zip(&input) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_empty_impulse_is_silent() {
        let mut convolver = PartitionedConvolver::new(&[], 16).unwrap();
        assert_eq!(convolver.partition_count(), 1);
        let out = convolver.convolve(&test_signal(40));
        assert!(out.iter().all(|s| s.abs() < 1e-7));
    }

    #[test]
    fn test_zero_block_rejected() {
        assert!(PartitionedConvolver::new(&[1.0], 0).is_err());
    }

    #[test]
    fn test_streaming_has_one_block_latency() {
        let impulse = [0.5, 0.25, 0.125];
        let input = test_signal(150);
        let expected = direct_convolution(&input, &impulse);

        let mut streaming = StreamingConvolver::new(&impulse, 16).unwrap();
        assert_eq!(streaming.latency(), 16);

        // Feed in uneven chunks
        let mut output = vec![0.0; input.len()];
        let mut offset = 0;
        for size in [7, 30, 1, 64, 48] {
            streaming.process(&input[offset..offset + size], &mut output[offset..offset + size]);
            offset += size;
        }
        assert_eq!(offset, input.len());

        assert!(output[..16].iter().all(|s| *s == 0.0));
        for (a, b) in output[16..].iter().zip(&expected) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_reset_clears_history() {
        let mut convolver = PartitionedConvolver::new(&[0.0, 1.0], 4).unwrap();
        let mut out = [0.0; 4];
        convolver.process_block(&[1.0, 1.0, 1.0, 1.0], &mut out);
        convolver.reset();
        convolver.process_block(&[0.0; 4], &mut out);
        assert!(out.iter().all(|s| s.abs() < 1e-6));
    }
}
