/// One camera frame, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>, // len = w*h
}

impl FrameImage {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        (x < self.width && y < self.height).then(|| self.data[y * self.width + x])
    }

    /// Smallest and largest pixel value, `None` for an empty frame.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.data.iter().copied().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Provider of raw camera frames, e.g. a TIFF stack reader.
pub trait ImageSource {
    /// Number of frames, 0 when nothing is loaded. Valid frame indices are
    /// `0..max_frame()`.
    fn max_frame(&self) -> usize;

    fn image(&self, frame: usize) -> Option<FrameImage>;
}

/// In-memory frame stack.
#[derive(Clone, Debug, Default)]
pub struct FrameStack {
    frames: Vec<FrameImage>,
}

impl FrameStack {
    pub fn new(frames: Vec<FrameImage>) -> Self {
        Self { frames }
    }

    pub fn push(&mut self, frame: FrameImage) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl ImageSource for FrameStack {
    fn max_frame(&self) -> usize {
        self.frames.len()
    }

    fn image(&self, frame: usize) -> Option<FrameImage> {
        self.frames.get(frame).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_stack_serves_frames() {
        let mut stack = FrameStack::default();
        assert_eq!(stack.max_frame(), 0);
        assert!(stack.image(0).is_none());

        stack.push(FrameImage::new(2, 1, vec![1.0, 3.0]).unwrap());
        assert_eq!(stack.max_frame(), 1);
        stack.push(FrameImage::new(2, 1, vec![0.0, 5.0]).unwrap());
        assert_eq!(stack.max_frame(), 2);
        let img = stack.image(1).unwrap();
        assert_eq!(img.get(1, 0), Some(5.0));
        assert_eq!(img.get(2, 0), None);
        assert_eq!(img.value_range(), Some((0.0, 5.0)));
    }

    #[test]
    fn frame_size_must_match_data() {
        assert!(FrameImage::new(3, 3, vec![0.0; 8]).is_none());
    }
}
