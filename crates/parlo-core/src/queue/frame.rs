//! Lock-free frame handoff from the control side to the audio side.

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

/// One hop's worth of finalized vocoder parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    /// Mel-generalized cepstrum, static features only.
    pub mgc: Vec<f64>,
    /// Log F0; meaningless when `voiced` is false.
    pub lf0: f64,
    pub voiced: bool,
    /// Low-pass filter coefficients.
    pub lpf: Vec<f64>,
}

impl Frame {
    /// Fundamental frequency in Hz, or `0.0` for unvoiced frames.
    pub fn f0(&self) -> f64 {
        if self.voiced {
            self.lf0.exp()
        } else {
            0.0
        }
    }
}

/// Producer side, owned by the pipeline.
pub struct FrameProducer {
    producer: HeapProd<Frame>,
}

impl FrameProducer {
    /// Push a frame. Returns it back if the queue is full.
    #[inline]
    pub fn push(&mut self, frame: Frame) -> Result<(), Frame> {
        self.producer.try_push(frame)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.producer.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.producer.is_empty()
    }

    #[inline]
    pub fn free_len(&self) -> usize {
        self.producer.vacant_len()
    }

    pub fn capacity(&self) -> usize {
        self.producer.capacity().get()
    }
}

/// Consumer side, owned by the sample driver.
pub struct FrameConsumer {
    consumer: HeapCons<Frame>,
}

impl FrameConsumer {
    /// Oldest frame, removing it from the queue.
    #[inline]
    pub fn pop(&mut self) -> Option<Frame> {
        self.consumer.try_pop()
    }

    /// Drop every pending frame. Returns how many were dropped.
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.consumer.try_pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.consumer.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

/// Create a bounded frame queue.
pub fn frame_channel(capacity: usize) -> (FrameProducer, FrameConsumer) {
    let rb = HeapRb::new(capacity);
    let (producer, consumer) = rb.split();
    (FrameProducer { producer }, FrameConsumer { consumer })
}
