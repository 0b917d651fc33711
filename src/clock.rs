/// Pausable elapsed-time accumulator with a single movable mark.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Clock {
    current_time: f32,
    mark: f32,
    paused: bool,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances by `dt` unless paused. Returns the time actually added.
    pub fn tick(&mut self, dt: f32) -> f32 {
        if self.paused {
            return 0.0;
        }
        let dt = dt.max(0.0);
        self.current_time += dt;
        dt
    }

    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Back to zero, mark included. The paused flag is kept.
    pub fn reset(&mut self) {
        self.current_time = 0.0;
        self.mark = 0.0;
    }

    pub fn mark(&mut self) {
        self.mark = self.current_time;
    }

    pub fn since_mark(&self) -> f32 {
        self.current_time - self.mark
    }
}
