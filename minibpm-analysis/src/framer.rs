//! Overlapping frame segmentation of a running sample stream

/// Cuts a stream of sample blocks into fixed-length, overlapping frames
///
/// Blocks are treated as one continuous stream: a frame may start in one
/// call to [`push`](Self::push) and finish in a later one. The frames
/// produced depend only on the concatenated samples, never on how they were
/// split into blocks.
#[derive(Debug, Clone)]
pub struct FrameSegmenter {
    frame_len: usize,
    hop: usize,
    /// Samples of the frame currently being filled; always shorter than a frame between calls
    pending: Vec<f32>,
}

impl FrameSegmenter {
    /// Create a segmenter producing `frame_len` samples every `hop` samples
    ///
    /// `hop` is clamped to `1..=frame_len`.
    pub fn new(frame_len: usize, hop: usize) -> Self {
        let frame_len = frame_len.max(1);
        Self {
            frame_len,
            hop: hop.clamp(1, frame_len),
            pending: Vec::with_capacity(frame_len),
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of buffered samples not yet part of a complete frame
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append a block of samples, calling `on_frame` for every frame it completes
    pub fn push<F>(&mut self, samples: &[f32], mut on_frame: F)
    where
        F: FnMut(&[f32]),
    {
        let mut input = samples;
        while !input.is_empty() {
            let take = (self.frame_len - self.pending.len()).min(input.len());
            self.pending.extend_from_slice(&input[..take]);
            input = &input[take..];

            if self.pending.len() == self.frame_len {
                on_frame(&self.pending);
                self.pending.drain(..self.hop);
            }
        }
    }

    /// Drop any partially filled frame
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}
