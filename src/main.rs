use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use bpaf::{Bpaf, Parser};
use g19::{G19Handle, MKeyLeds, G19};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::color::Color;
use crate::config::{Config, DisplayConfig};
use crate::events::EventLogger;

mod color;
mod config;
mod events;
mod lock;

#[derive(Clone, Debug, Bpaf)]
enum SetCommand {
    /// Set the keyboard backlight color
    #[bpaf(command)]
    Color {
        /// Also store the color as the default used after a reset
        #[bpaf(short, long)]
        save: bool,
        /// Backlight color (hex: #RRGGBB or #RGB)
        #[bpaf(positional("COLOR"))]
        color: Color,
    },
    /// Set the display brightness
    #[bpaf(command)]
    Brightness {
        /// Brightness from 0 (off) to 100
        #[bpaf(positional("LEVEL"), guard(|l| *l <= 100, "brightness must be within 0..=100"))]
        level: u8,
    },
    /// Set the illuminated M-keys, unlisted keys are turned off
    #[bpaf(command("mkeys"))]
    MKeys {
        /// Illuminate M1
        #[bpaf(long("m1"))]
        m1: bool,
        /// Illuminate M2
        #[bpaf(long("m2"))]
        m2: bool,
        /// Illuminate M3
        #[bpaf(long("m3"))]
        m3: bool,
        /// Illuminate MR
        #[bpaf(long("mr"))]
        mr: bool,
    },
    /// Fill the display with one color
    #[bpaf(command)]
    Fill {
        /// Display color (hex: #RRGGBB or #RGB)
        #[bpaf(positional("COLOR"))]
        color: Color,
    },
    /// Show a gradient test pattern on the display
    #[bpaf(command)]
    Pattern,
}

#[derive(Clone, Debug, Bpaf)]
#[bpaf(options, version, descr(env!("CARGO_PKG_DESCRIPTION")))]
struct Cli {
    /// Issue a bus reset to the display before opening it
    #[bpaf(long("reset-on-start"))]
    reset_on_start: bool,
    #[bpaf(external(command))]
    command: Command,
}

#[derive(Clone, Debug)]
enum Command {
    /// Handle key events until interrupted (default).
    Run { idle: Option<humantime::Duration> },
    /// Set specific options on the keyboard.
    /// Must not be used while the driver is already running.
    Set { set_command: SetCommand },
    /// Initiate a bus reset
    Reset,
}

fn command() -> impl Parser<Command> {
    let idle = bpaf::long("idle")
        .help("Sleep between poll cycles without key data, overriding the config file")
        .argument::<humantime::Duration>("DURATION")
        .optional();
    let run = bpaf::construct!(Command::Run { idle })
        .to_options()
        .descr("Handle key events until interrupted")
        .command("run")
        .help("Handle key events until interrupted (default)");

    let set = set_command()
        .map(|set_command| Command::Set { set_command })
        .to_options()
        .descr("Set specific options on the keyboard")
        .command("set")
        .help("Set specific options on the keyboard");

    let reset = bpaf::pure(Command::Reset)
        .to_options()
        .descr("Initiate a bus reset")
        .command("reset")
        .help("Initiate a bus reset");

    bpaf::construct!([run, set, reset]).fallback(Command::Run { idle: None })
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn m_key_leds(m1: bool, m2: bool, m3: bool, mr: bool) -> MKeyLeds {
    [
        (m1, MKeyLeds::M1),
        (m2, MKeyLeds::M2),
        (m3, MKeyLeds::M3),
        (mr, MKeyLeds::MR),
    ]
    .into_iter()
    .filter(|(on, _)| *on)
    .fold(MKeyLeds::NONE, |leds, (_, led)| leds | led)
}

fn apply_set(device: &G19Handle, command: SetCommand) -> Result<(), Box<dyn Error>> {
    match command {
        SetCommand::Color { save, color } => {
            let [r, g, b] = color.0;
            if save {
                device.save_default_bg_color(r, g, b)?;
            }
            device.set_bg_color(r, g, b)?;
            info!("set backlight to {color}");
        },
        SetCommand::Brightness { level } => {
            device.set_display_brightness(level)?;
            info!("set display brightness to {level}");
        },
        SetCommand::MKeys { m1, m2, m3, mr } => {
            let leds = m_key_leds(m1, m2, m3, mr);
            device.set_enabled_m_keys(leds)?;
            info!("set m-key leds to {:#04x}", leds.bits());
        },
        SetCommand::Fill { color } => {
            let [r, g, b] = color.0;
            device.fill_display_with_color(r, g, b)?;
            info!("filled display with {color}");
        },
        SetCommand::Pattern => {
            device.set_display_colorful()?;
            info!("sent test pattern");
        },
    }
    Ok(())
}

/// Apply the display settings from the config file
fn apply_display(device: &G19Handle, display: &DisplayConfig) -> Result<(), Box<dyn Error>> {
    if let Some(level) = display.brightness {
        device.set_display_brightness(level)?;
    }
    if let Some(Color([r, g, b])) = display.background_color {
        device.set_bg_color(r, g, b)?;
    }
    if let Some(Color([r, g, b])) = display.fill_color {
        device.fill_display_with_color(r, g, b)?;
    }
    Ok(())
}

fn run_daemon(config: &Config, reset: bool, idle: Option<Duration>) -> Result<(), Box<dyn Error>> {
    let _lock = lock::Lock::acquire()?;

    let mut poll = config.poll_config();
    if let Some(idle) = idle {
        poll.idle_sleep = idle;
    }
    let mut device = G19::open(reset, poll)?;
    apply_display(&device.handle(), &config.display)?;

    device.add_input_processor(Arc::new(EventLogger));
    device.start_event_handling()?;
    info!("handling key events, press ctrl-c to stop");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(tokio::signal::ctrl_c())?;

    info!("stopping");
    device.stop_event_handling();
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = cli().run();
    let config = Config::load_or_create()?;
    init_logging(&config.general.log_filter);
    if let Some(path) = Config::path() {
        debug!("using config at {}", path.display());
    }

    let reset = cli.reset_on_start || config.general.reset_on_start;
    match cli.command {
        Command::Run { idle } => run_daemon(&config, reset, idle.map(Into::into)),
        Command::Set { set_command } => {
            let device = G19::open(reset, config.poll_config())?;
            apply_set(&device.handle(), set_command)
        },
        Command::Reset => {
            let device = G19::open(false, config.poll_config())?;
            device.handle().reset()?;
            info!("reset device");
            Ok(())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_invariants() {
        cli().check_invariants(false);
    }

    #[test]
    fn run_is_the_default() {
        let parsed = cli().run_inner(&["--reset-on-start"]).unwrap();
        assert!(parsed.reset_on_start);
        assert!(matches!(parsed.command, Command::Run { idle: None }));
    }

    #[test]
    fn run_with_idle() {
        let parsed = cli().run_inner(&["run", "--idle", "50ms"]).unwrap();
        let Command::Run { idle: Some(idle) } = parsed.command else {
            panic!("expected run command");
        };
        assert_eq!(Duration::from(idle), Duration::from_millis(50));
    }

    #[test]
    fn set_color() {
        let parsed = cli().run_inner(&["set", "color", "--save", "#f00"]).unwrap();
        assert!(matches!(
            parsed.command,
            Command::Set {
                set_command: SetCommand::Color {
                    save: true,
                    color: Color([255, 0, 0])
                }
            }
        ));
    }

    #[test]
    fn set_brightness_is_bounded() {
        assert!(cli().run_inner(&["set", "brightness", "101"]).is_err());
        let parsed = cli().run_inner(&["set", "brightness", "55"]).unwrap();
        assert!(matches!(
            parsed.command,
            Command::Set {
                set_command: SetCommand::Brightness { level: 55 }
            }
        ));
    }

    #[test]
    fn set_m_keys() {
        let parsed = cli().run_inner(&["set", "mkeys", "--m1", "--mr"]).unwrap();
        let Command::Set {
            set_command: SetCommand::MKeys { m1, m2, m3, mr },
        } = parsed.command
        else {
            panic!("expected mkeys command");
        };
        assert_eq!(m_key_leds(m1, m2, m3, mr), MKeyLeds::M1 | MKeyLeds::MR);
        assert_eq!(m_key_leds(false, false, false, false), MKeyLeds::NONE);
    }
}
