use crate::mijia::Reading;

/// Accumulator for one ingestion cycle. Created empty, filled incrementally
/// across connection attempts, flushed only once all three fields are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub battery_percent: Option<u8>,
}

impl Sample {
    pub fn record_battery(&mut self, percent: u8) {
        self.battery_percent = Some(percent);
    }

    pub fn record_reading(&mut self, reading: Reading) {
        self.temperature = Some(reading.temperature);
        self.humidity = Some(reading.humidity);
    }

    pub fn is_complete(&self) -> bool {
        self.temperature.is_some() && self.humidity.is_some() && self.battery_percent.is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
