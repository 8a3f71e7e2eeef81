/// Tracks the viewport surface dimensions in logical pixels. Polled
/// once per update; a true return from [`Container::recompute`] is the
/// resize signal the cameras and render targets react to.
#[derive(Debug, Clone, Copy)]
pub struct Container {
    width: f32,
    height: f32,
    aspect: f32,
}

impl Container {
    pub fn new(width: f32, height: f32) -> Self {
        let mut c = Self {
            width: 0.0,
            height: 0.0,
            aspect: 1.0,
        };
        c.recompute(width, height);
        c
    }

    /// Updates the stored dimensions. Returns true only when they
    /// actually changed.
    pub fn recompute(&mut self, width: f32, height: f32) -> bool {
        if width == self.width && height == self.height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.aspect = if height > 1.0 { width / height } else { 1.0 };
        true
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_reports_change_once() {
        let mut c = Container::new(800.0, 600.0);
        assert!(!c.recompute(800.0, 600.0));
        assert!(c.recompute(1024.0, 600.0));
        assert!(!c.recompute(1024.0, 600.0));
        assert!((c.aspect() - 1024.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_height_keeps_square_aspect() {
        let c = Container::new(640.0, 0.0);
        assert_eq!(c.aspect(), 1.0);
    }
}
