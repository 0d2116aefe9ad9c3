//! Selects the decoded frames that fall inside the requested time window.

/// Frame-index boundaries derived from a start/end time and a frame rate
///
/// Decoded frames are counted from 1. A frame is kept when its counter is strictly
/// greater than `start_frame` and at most `end_frame`; the first counter past
/// `end_frame` ends decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimWindow {
    pub start_frame: u64,
    pub end_frame: u64,
}

/// What to do with the frame carrying a given decode counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimDecision {
    Skip,
    Emit,
    Stop,
}

impl TrimWindow {
    /// Convert second boundaries to frame boundaries, truncating toward zero
    pub fn from_seconds(fps: f64, start_sec: f64, end_sec: f64) -> Self {
        Self {
            start_frame: seconds_to_frame(fps, start_sec),
            end_frame: seconds_to_frame(fps, end_sec),
        }
    }

    pub fn decide(&self, counter: u64) -> TrimDecision {
        if counter > self.end_frame {
            TrimDecision::Stop
        } else if counter <= self.start_frame {
            TrimDecision::Skip
        } else {
            TrimDecision::Emit
        }
    }

    /// Number of frames emitted when the source is long enough
    pub fn expected_frames(&self) -> u64 {
        self.end_frame.saturating_sub(self.start_frame)
    }

    /// Wrap a decoded frame sequence so that only frames inside the window come out
    pub fn apply<I>(self, frames: I) -> TrimmedFrames<I> {
        TrimmedFrames {
            inner: frames,
            window: self,
            counter: 0,
            emitted: 0,
            done: false,
        }
    }
}

fn seconds_to_frame(fps: f64, seconds: f64) -> u64 {
    let frames = (seconds * fps).floor();
    if frames.is_finite() && frames > 0.0 {
        frames as u64
    } else {
        0
    }
}

/// Iterator adapter yielding `(output_index, item)` for frames inside a [`TrimWindow`]
///
/// After the frame at the end boundary (or the first one past it) has been pulled,
/// the inner iterator is never polled again. Errors from the inner iterator are
/// passed through as-is and do not advance the output index.
pub struct TrimmedFrames<I> {
    inner: I,
    window: TrimWindow,
    counter: u64,
    emitted: u64,
    done: bool,
}

impl<I> TrimmedFrames<I> {
    /// Frames handed downstream so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Frames pulled from the source so far, including skipped ones
    pub fn decoded(&self) -> u64 {
        self.counter
    }
}

impl<I, T, E> Iterator for TrimmedFrames<I>
where
    I: Iterator<Item = Result<T, E>>,
{
    type Item = Result<(u64, T), E>;

    fn next(&mut self) -> Option<Self::Item> {
        // Nothing can be emitted, so don't decode at all.
        if self.window.end_frame == 0 {
            self.done = true;
        }

        while !self.done {
            let frame = match self.inner.next()? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(e)),
            };
            self.counter += 1;

            match self.window.decide(self.counter) {
                TrimDecision::Skip => continue,
                TrimDecision::Stop => self.done = true,
                TrimDecision::Emit => {
                    let index = self.emitted;
                    self.emitted += 1;
                    if self.counter == self.window.end_frame {
                        self.done = true;
                    }
                    return Some(Ok((index, frame)));
                }
            }
        }

        None
    }
}
