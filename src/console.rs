use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use heapless::String;

/// Dispatch poll interval, milliseconds. Worst-case command latency is one
/// interval.
pub const POLL_INTERVAL_MS: u64 = 100;

/// Reply for any byte outside the command set.
pub const HELP_LINE: &str = "Unassigned button!!!! Try a, s, d, f or g";

/// The five console commands, one per reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Accelerometer,
    Gyroscope,
    Magnetometer,
    Environment,
    Distance,
}

impl Command {
    /// Case-sensitive lookup; anything unmapped is answered with [`HELP_LINE`].
    pub const fn parse(byte: u8) -> Option<Self> {
        match byte {
            b'a' => Some(Self::Accelerometer),
            b's' => Some(Self::Gyroscope),
            b'd' => Some(Self::Magnetometer),
            b'f' => Some(Self::Environment),
            b'g' => Some(Self::Distance),
            _ => None,
        }
    }
}

/// One-slot handoff between the UART receive task and the dispatch loop.
///
/// A second byte posted before the previous one is taken overwrites it: the
/// console keeps at most one pending command. The underlying `Signal`
/// publishes the byte before the readiness wake, so the consumer never
/// observes readiness with stale data.
pub struct CommandMailbox {
    slot: Signal<CriticalSectionRawMutex, u8>,
}

impl CommandMailbox {
    pub const fn new() -> Self {
        Self {
            slot: Signal::new(),
        }
    }

    /// Producer side. Last write wins.
    pub fn post(&self, byte: u8) {
        self.slot.signal(byte);
    }

    /// Consumer side. Clears the slot, so an arrival racing with the take is
    /// deferred to the next dispatch cycle rather than lost.
    pub fn take(&self) -> Option<u8> {
        self.slot.try_take()
    }
}

pub type Line = String<64>;

pub fn format_accel(axes: [i32; 3]) -> Line {
    let mut line = Line::new();
    let _ = write!(
        line,
        "LSM6DSL [acc/mg]:        {:6}, {:6}, {:6}",
        axes[0], axes[1], axes[2]
    );
    line
}

pub fn format_gyro(axes: [i32; 3]) -> Line {
    let mut line = Line::new();
    let _ = write!(
        line,
        "LSM6DSL [gyro/mdps]:     {:6}, {:6}, {:6}",
        axes[0], axes[1], axes[2]
    );
    line
}

pub fn format_mag(axes: [i32; 3]) -> Line {
    let mut line = Line::new();
    let _ = write!(
        line,
        "LIS3MDL [mag/mgauss]:    {:6}, {:6}, {:6}",
        axes[0], axes[1], axes[2]
    );
    line
}

pub fn format_press_temp(temperature: f32, pressure: f32) -> Line {
    let mut line = Line::new();
    let _ = write!(
        line,
        "LPS22HB: [temp] {:.2} C, [press] {:.2} mbar",
        temperature, pressure
    );
    line
}

/// Banner line for one sensor's identification byte, label column aligned
/// across the four sensors.
pub fn format_id_line(label: &str, id: u8) -> Line {
    let mut line = Line::new();
    let _ = write!(line, "{:<33} = {:#X}", label, id);
    line
}

/// `None` stands for a failed ranging cycle; the value column shows `--`
/// instead of a number.
pub fn format_distance(distance_mm: Option<u32>) -> Line {
    let mut line = Line::new();
    match distance_mm {
        Some(mm) => {
            let _ = write!(line, "VL53L0X [mm]:            {:6}", mm);
        }
        None => {
            let _ = write!(line, "VL53L0X [mm]:            {:>6}", "--");
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_table_is_exact() {
        assert_eq!(Command::parse(b'a'), Some(Command::Accelerometer));
        assert_eq!(Command::parse(b's'), Some(Command::Gyroscope));
        assert_eq!(Command::parse(b'd'), Some(Command::Magnetometer));
        assert_eq!(Command::parse(b'f'), Some(Command::Environment));
        assert_eq!(Command::parse(b'g'), Some(Command::Distance));
    }

    #[test]
    fn unmapped_bytes_parse_to_none() {
        for byte in 0u8..=255 {
            let expected = matches!(byte, b'a' | b's' | b'd' | b'f' | b'g');
            assert_eq!(Command::parse(byte).is_some(), expected);
        }
        // Case-sensitive: upper-case letters are not commands.
        assert_eq!(Command::parse(b'A'), None);
        assert_eq!(Command::parse(b'G'), None);
    }

    #[test]
    fn help_line_names_the_command_set() {
        assert_eq!(HELP_LINE, "Unassigned button!!!! Try a, s, d, f or g");
    }

    #[test]
    fn accel_line_has_label_and_three_fields() {
        let line = format_accel([100, -25, 1003]);
        assert!(line.as_str().starts_with("LSM6DSL [acc/mg]:"));
        assert_eq!(
            line.as_str(),
            "LSM6DSL [acc/mg]:           100,    -25,   1003"
        );
    }

    #[test]
    fn gyro_and_mag_lines_have_their_labels() {
        assert!(format_gyro([0, 0, 0])
            .as_str()
            .starts_with("LSM6DSL [gyro/mdps]:"));
        assert!(format_mag([-70, 350, 10])
            .as_str()
            .starts_with("LIS3MDL [mag/mgauss]:"));
    }

    #[test]
    fn environment_reading_is_a_single_lps22hb_line() {
        let line = format_press_temp(22.75, 1013.25);
        assert_eq!(
            line.as_str(),
            "LPS22HB: [temp] 22.75 C, [press] 1013.25 mbar"
        );
        assert!(!line.as_str().contains('\n'));
        assert!(!line.as_str().contains("HTS221"));
    }

    #[test]
    fn distance_line_prints_value_or_placeholder() {
        assert_eq!(
            format_distance(Some(123)).as_str(),
            "VL53L0X [mm]:               123"
        );
        assert_eq!(
            format_distance(None).as_str(),
            "VL53L0X [mm]:                --"
        );
        assert!(!format_distance(None).as_str().contains(|c: char| c.is_ascii_digit()));
    }

    #[test]
    fn id_lines_align_the_value_column() {
        assert_eq!(
            format_id_line("HTS221  humidity & temperature", 0xBC).as_str(),
            "HTS221  humidity & temperature    = 0xBC"
        );
        assert_eq!(
            format_id_line("LSM6DSL accelerometer & gyroscope", 0x6A).as_str(),
            "LSM6DSL accelerometer & gyroscope = 0x6A"
        );
    }

    #[test]
    fn formatting_is_idempotent() {
        let first = format_accel([1, 2, 3]);
        for _ in 0..5 {
            assert_eq!(format_accel([1, 2, 3]), first);
        }
    }

    #[test]
    fn mailbox_keeps_the_most_recent_byte() {
        let mailbox = CommandMailbox::new();
        mailbox.post(b'a');
        mailbox.post(b's');
        assert_eq!(mailbox.take(), Some(b's'));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn mailbox_take_clears_before_the_next_post() {
        let mailbox = CommandMailbox::new();
        mailbox.post(b'g');
        assert_eq!(mailbox.take(), Some(b'g'));
        mailbox.post(b'd');
        assert_eq!(mailbox.take(), Some(b'd'));
    }
}
