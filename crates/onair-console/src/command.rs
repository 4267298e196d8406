//! Line commands read from stdin
//!
//! ```text
//! fx <effect>                    toggle an effect
//! set <effect> key=value ...     update effect parameters
//! vol <0..1> | mute on|off | listen on|off | cue on|off
//! limit <db> | gate <db>
//! pad load <n> <path> | pad play|stop|rm <n>
//! pad loop <n> on|off | pad gain <n> <0..3>
//! rec start [program|monitor] | rec stop
//! meters | status | help | quit
//! ```

use std::path::PathBuf;

use onair_core::capture::CaptureTap;
use onair_core::effect::{EffectKind, ParamMap};

pub const HELP: &str = "\
fx <effect>                  toggle enhance|tone|compressor|pitch|delay|reverb
set <effect> key=value ...   update effect parameters
vol <0..1>                   mic volume
mute|listen|cue on|off       mixer modes
limit <db>                   limiter ceiling (0, -3, -6, -12)
gate <db>                    noise gate threshold (-100 disables)
pad load <n> <path>          load a file into pad n
pad play|stop|rm <n>         pad transport
pad loop <n> on|off          pad looping
pad gain <n> <0..3>          pad gain
rec start [program|monitor]  start recording
rec stop                     stop and save the recording
meters | status | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ToggleEffect(EffectKind),
    UpdateEffect(EffectKind, ParamMap),
    MicVolume(f32),
    Mute(bool),
    Listen(bool),
    Cue(bool),
    Limit(f32),
    Gate(f32),
    PadLoad(usize, PathBuf),
    PadPlay(usize),
    PadStop(usize),
    PadRemove(usize),
    PadLoop(usize, bool),
    PadGain(usize, f32),
    RecordStart(CaptureTap),
    RecordStop,
    Meters,
    Status,
    Help,
    Quit,
}

fn number<T: std::str::FromStr>(word: Option<&str>, what: &str) -> Result<T, String> {
    let word = word.ok_or_else(|| format!("missing {}", what))?;
    word.parse()
        .map_err(|_| format!("invalid {}: {}", what, word))
}

fn switch(word: Option<&str>) -> Result<bool, String> {
    match word {
        Some("on") | Some("1") | Some("true") => Ok(true),
        Some("off") | Some("0") | Some("false") => Ok(false),
        Some(other) => Err(format!("expected on/off, got {}", other)),
        None => Err("expected on/off".to_string()),
    }
}

fn effect(word: Option<&str>) -> Result<EffectKind, String> {
    word.ok_or_else(|| "missing effect name".to_string())?
        .parse()
        .map_err(|e: onair_core::effect::UnknownEffect| e.to_string())
}

impl Command {
    /// Parse one input line; `Ok(None)` for a blank line
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };

        let cmd = match head {
            "fx" => Command::ToggleEffect(effect(words.next())?),
            "set" => {
                let kind = effect(words.next())?;
                let mut params = ParamMap::new();
                for pair in words {
                    let (key, value) = pair
                        .split_once('=')
                        .ok_or_else(|| format!("expected key=value, got {}", pair))?;
                    params.insert(key.to_string(), number(Some(value), key)?);
                }
                Command::UpdateEffect(kind, params)
            }
            "vol" => Command::MicVolume(number(words.next(), "volume")?),
            "mute" => Command::Mute(switch(words.next())?),
            "listen" => Command::Listen(switch(words.next())?),
            "cue" => Command::Cue(switch(words.next())?),
            "limit" => Command::Limit(number(words.next(), "threshold")?),
            "gate" => Command::Gate(number(words.next(), "threshold")?),
            "pad" => {
                let action = words.next().ok_or("missing pad action")?;
                let pad = number(words.next(), "pad index")?;
                match action {
                    "load" => {
                        let rest: Vec<&str> = words.collect();
                        if rest.is_empty() {
                            return Err("missing file path".to_string());
                        }
                        Command::PadLoad(pad, PathBuf::from(rest.join(" ")))
                    }
                    "play" => Command::PadPlay(pad),
                    "stop" => Command::PadStop(pad),
                    "rm" | "remove" => Command::PadRemove(pad),
                    "loop" => Command::PadLoop(pad, switch(words.next())?),
                    "gain" => Command::PadGain(pad, number(words.next(), "gain")?),
                    other => return Err(format!("unknown pad action: {}", other)),
                }
            }
            "rec" => match words.next() {
                Some("start") => {
                    let tap = match words.next() {
                        Some(word) => word.parse()?,
                        None => CaptureTap::Program,
                    };
                    Command::RecordStart(tap)
                }
                Some("stop") => Command::RecordStop,
                _ => return Err("expected rec start|stop".to_string()),
            },
            "meters" => Command::Meters,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(format!("unknown command: {} (try help)", other)),
        };
        Ok(Some(cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line).expect("parses").expect("not blank")
    }

    #[test]
    fn test_effect_commands() {
        assert_eq!(parse("fx comp"), Command::ToggleEffect(EffectKind::Compressor));
        match parse("set delay timing=80 repeats=10") {
            Command::UpdateEffect(kind, params) => {
                assert_eq!(kind, EffectKind::Delay);
                assert_eq!(params["timing"], 80.0);
                assert_eq!(params["repeats"], 10.0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Command::parse("set delay timing").is_err());
        assert!(Command::parse("fx flanger").is_err());
    }

    #[test]
    fn test_pad_commands() {
        assert_eq!(
            parse("pad load 2 /tmp/jingle one.wav"),
            Command::PadLoad(2, PathBuf::from("/tmp/jingle one.wav"))
        );
        assert_eq!(parse("pad loop 0 on"), Command::PadLoop(0, true));
        assert_eq!(parse("pad gain 7 2.5"), Command::PadGain(7, 2.5));
        assert!(Command::parse("pad play").is_err());
    }

    #[test]
    fn test_recording_and_modes() {
        assert_eq!(parse("rec start"), Command::RecordStart(CaptureTap::Program));
        assert_eq!(
            parse("rec start monitor"),
            Command::RecordStart(CaptureTap::Monitor)
        );
        assert_eq!(parse("cue off"), Command::Cue(false));
        assert_eq!(parse("limit -6"), Command::Limit(-6.0));
        assert!(Command::parse("mute maybe").is_err());
        assert_eq!(Command::parse("   ").expect("blank"), None);
    }
}
