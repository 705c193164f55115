//! CLI/env/persisted-pick-file resolution (spec §6 "External interfaces";
//! `SPEC_FULL.md` §10-11): the one place environment variables are read,
//! matching spec §9's "Global mutable state" guidance to resolve them once
//! inside a configuration constructor rather than at scattered call sites.
//!
//! This crate is an "external collaborator" in spec §1's sense — the core
//! (`dobby-draft`, `dobby-picks`, `dobby-view`, `dobby-proto`,
//! `dobby-render`) never parses a flag or reads an environment variable
//! itself; it only consumes the [`Options`] this crate produces.

pub mod args;
pub mod error;
pub mod pickfile;

use std::path::PathBuf;

use dobby_color::Color;
use dobby_draft::DobbyType;
use dobby_proto::{Generation, LoomAddress};
use dobby_render::ColorAlert;
use dobby_terminal::{AnsiMode, Capabilities};

pub use args::Cli;
pub use error::ConfigError;

type Result<T> = std::result::Result<T, ConfigError>;

/// The default fallback for `--loomAddress` / `DRAWBOY_LOOMADDRESS`, the
/// factory address of a Compu-Dobby IV's network interface.
const DEFAULT_LOOM_ADDRESS: &str = "169.254.128.3";

/// The telnet-style port a Compu-Dobby IV listens on (spec §4.5 "Generation
/// 4 (text)").
const GEN4_PORT: u16 = 23;

/// The default tabby spec: alternating `a`/`b`, one shaft per character,
/// long enough to cover the largest supported loom (40 shafts).
const DEFAULT_TABBY_SPEC: &str = "abababababababababababababababababababab";

const DEFAULT_TABBY_COLOR: &str = "00FF00";

/// Which pattern to use when splicing auto-tabby picks in around pattern
/// picks (spec §3 "tabby pattern"). The two bits it decomposes into are
/// what `dobby_picks::compile` actually needs; see [`TabbyPattern::flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabbyPattern {
    XAyB,
    AxBy,
    XByA,
    BxAy,
}

impl TabbyPattern {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xayb" => Some(Self::XAyB),
            "axby" => Some(Self::AxBy),
            "xbya" => Some(Self::XByA),
            "bxay" => Some(Self::BxAy),
            _ => None,
        }
    }

    /// `(pattern_before_tabby, tabby_a_first)` — the two independent flags
    /// `dobby_picks::compile` takes. Reading the name letter by letter
    /// gives the order directly: `xAyB` is pattern, tabbyA, pattern,
    /// tabbyB; `AxBy` is tabbyA, pattern, tabbyB, pattern; and so on.
    pub fn flags(self) -> (bool, bool) {
        match self {
            Self::XAyB => (true, true),
            Self::AxBy => (false, true),
            Self::XByA => (true, false),
            Self::BxAy => (false, false),
        }
    }
}

/// Everything the rest of the process needs, resolved once from CLI flags,
/// environment variables, and the persisted-pick file.
#[derive(Debug, Clone)]
pub struct Options {
    pub draft_path: PathBuf,
    pub generation: Generation,
    pub dobby_type: DobbyType,
    /// `None` for gen 4, whose shaft count is reported by the loom's
    /// greeting rather than configured up front.
    pub max_shafts: Option<u32>,
    pub loom_address: LoomAddress,
    pub start_pick: i32,
    pub pick_list: String,
    pub tabby_a_mask: u64,
    pub tabby_b_mask: u64,
    pub tabby_pattern: TabbyPattern,
    pub tabby_color: Color,
    pub color_alert: ColorAlert,
    pub treadle_threading: bool,
    pub capabilities: Capabilities,
    pub check: bool,
    pub log: bool,
    pub findloom: bool,
    pub pickfile_path: PathBuf,
}

impl Options {
    pub fn resolve(cli: Cli) -> Result<Options> {
        if cli.findloom {
            return Ok(Options {
                draft_path: cli.draft_path,
                generation: Generation::Gen1,
                dobby_type: DobbyType::Positive,
                max_shafts: None,
                loom_address: LoomAddress::Serial(String::new()),
                start_pick: 1,
                pick_list: String::new(),
                tabby_a_mask: 0,
                tabby_b_mask: 0,
                tabby_pattern: TabbyPattern::XAyB,
                tabby_color: Color::default(),
                color_alert: ColorAlert::None,
                treadle_threading: false,
                capabilities: Capabilities::default(),
                check: false,
                log: false,
                findloom: true,
                pickfile_path: pickfile::path(),
            });
        }

        let generation = resolve_generation(&cli)?;
        let dobby_type = resolve_dobby_type(cli.dobby_type.as_deref(), generation)?;
        let max_shafts = resolve_shafts(cli.shafts.as_deref(), generation)?;
        let loom_address = resolve_loom_address(&cli, generation)?;

        let tabby_pattern = match cli.tabby_pattern.as_deref() {
            Some(s) => TabbyPattern::parse(s).ok_or(ConfigError::IllegalTabbyPattern)?,
            None => TabbyPattern::XAyB,
        };
        let (tabby_a_mask, tabby_b_mask) =
            parse_tabby_spec(cli.tabby.as_deref().unwrap_or(DEFAULT_TABBY_SPEC))?;
        let tabby_color = Color::from_hex(cli.tabby_color.as_deref().unwrap_or(DEFAULT_TABBY_COLOR))?;

        let color_alert_raw = cli.color_alert.as_deref().unwrap_or("none");
        let color_alert = parse_color_alert(color_alert_raw)?;

        let ascii = cli.ascii || std::env::var("DRAWBOY_ASCII").is_ok();
        let ansi = resolve_ansi(cli.ansi.as_deref())?;

        let pickfile_path = pickfile::path();
        let start_pick = resolve_start_pick(cli.pick.as_deref().unwrap_or("1"), &pickfile_path)?;

        Ok(Options {
            draft_path: cli.draft_path,
            generation,
            dobby_type,
            max_shafts,
            loom_address,
            start_pick,
            pick_list: cli.picks.unwrap_or_default(),
            tabby_a_mask,
            tabby_b_mask,
            tabby_pattern,
            tabby_color,
            color_alert,
            treadle_threading: cli.threading,
            capabilities: Capabilities::new(ascii, ansi),
            check: cli.check,
            log: cli.log,
            findloom: false,
            pickfile_path,
        })
    }
}

fn resolve_generation(cli: &Cli) -> Result<Generation> {
    if cli.cd1 {
        return Ok(Generation::Gen1);
    }
    if cli.cd2 {
        return Ok(Generation::Gen2);
    }
    if cli.cd3 {
        return Ok(Generation::Gen3);
    }
    if cli.cd4 {
        return Ok(Generation::Gen4);
    }
    match std::env::var("DRAWBOY_DOBBYGENERATION")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
    {
        Some(1) => Ok(Generation::Gen1),
        Some(2) => Ok(Generation::Gen2),
        Some(3) => Ok(Generation::Gen3),
        Some(4) => Ok(Generation::Gen4),
        _ => Err(ConfigError::MissingGeneration),
    }
}

fn resolve_dobby_type(raw: Option<&str>, generation: Generation) -> Result<DobbyType> {
    let raw = raw
        .map(str::to_string)
        .or_else(|| std::env::var("DRAWBOY_DOBBYTYPE").ok());
    let parsed = match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("positive") | Some("+") => Some(DobbyType::Positive),
        Some("negative") | Some("-") => Some(DobbyType::Negative),
        Some("virtual") => Some(DobbyType::Virtual),
        Some(_) => return Err(ConfigError::IllegalDobbyType),
        None => None,
    };
    if generation == Generation::Gen4 {
        if parsed.is_some() {
            tracing::info!("dobby type will be provided by the loom");
        }
        // Gen 4's greeting overrides this; Positive is an inert placeholder
        // until the handshake completes.
        return Ok(parsed.unwrap_or(DobbyType::Positive));
    }
    Ok(parsed.unwrap_or(DobbyType::Positive))
}

const VALID_SHAFT_COUNTS: [u32; 10] = [4, 8, 12, 16, 20, 24, 28, 32, 36, 40];

fn resolve_shafts(raw: Option<&str>, generation: Generation) -> Result<Option<u32>> {
    let raw = raw
        .map(str::to_string)
        .or_else(|| std::env::var("DRAWBOY_SHAFTS").ok());
    let parsed = match &raw {
        Some(s) => {
            let n: u32 = s.parse().map_err(|_| ConfigError::IllegalShaftCount)?;
            if !VALID_SHAFT_COUNTS.contains(&n) {
                return Err(ConfigError::IllegalShaftCount);
            }
            Some(n)
        }
        None => None,
    };
    if generation == Generation::Gen4 {
        if parsed.is_some() {
            tracing::info!("dobby shaft count will be provided by the loom");
        }
        return Ok(None);
    }
    parsed.map(Some).ok_or(ConfigError::MissingShaftCount)
}

fn resolve_loom_address(cli: &Cli, generation: Generation) -> Result<LoomAddress> {
    if let Ok(socket) = std::env::var("DRAWBOY_SOCKET") {
        return Ok(LoomAddress::UnixSocket(socket));
    }

    let loom_device = cli
        .loom_device
        .clone()
        .or_else(|| std::env::var("DRAWBOY_LOOMDEVICE").ok())
        .unwrap_or_default();
    let env_address_set = std::env::var("DRAWBOY_LOOMADDRESS").is_ok();
    let loom_address = cli
        .loom_address
        .clone()
        .or_else(|| std::env::var("DRAWBOY_LOOMADDRESS").ok())
        .unwrap_or_else(|| DEFAULT_LOOM_ADDRESS.to_string());

    let default_network = env_address_set;
    let wants_network = (cli.net || (default_network && loom_device.is_empty())) && generation == Generation::Gen4;

    if cli.net && generation != Generation::Gen4 {
        return Err(ConfigError::NetworkRequiresGen4);
    }

    if wants_network {
        if loom_address.is_empty() {
            return Err(ConfigError::MissingLoomAddress);
        }
        return Ok(LoomAddress::Tcp(loom_address, GEN4_PORT));
    }

    if loom_device.is_empty() {
        return Err(ConfigError::MissingLoomTarget);
    }
    Ok(LoomAddress::Serial(loom_device))
}

/// Parses a tabby spec string: one character per shaft, `a`/`A` assigns
/// that shaft to tabby A, `b`/`B` to tabby B, anything else leaves it out
/// of both.
fn parse_tabby_spec(spec: &str) -> Result<(u64, u64)> {
    let mut tabby_a = 0u64;
    let mut tabby_b = 0u64;
    for (shaft, ch) in spec.chars().enumerate() {
        if shaft >= 64 {
            break;
        }
        match ch {
            'a' | 'A' => tabby_a |= 1 << shaft,
            'b' | 'B' => tabby_b |= 1 << shaft,
            _ => {}
        }
    }
    if tabby_a == 0 && tabby_b == 0 {
        return Err(ConfigError::IllegalTabbySpec);
    }
    Ok((tabby_a, tabby_b))
}

fn parse_color_alert(raw: &str) -> Result<ColorAlert> {
    match raw.to_ascii_lowercase().as_str() {
        "none" => Ok(ColorAlert::None),
        "simple" => Ok(ColorAlert::Simple),
        "pulse" => Ok(ColorAlert::Pulse),
        "alternating" => Ok(ColorAlert::Alternating),
        _ => Err(ConfigError::IllegalColorAlert),
    }
}

fn resolve_ansi(raw: Option<&str>) -> Result<AnsiMode> {
    let raw = raw
        .map(str::to_string)
        .or_else(|| std::env::var("DRAWBOY_ANSI").ok());
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(AnsiMode::Yes),
        Some("no") => Ok(AnsiMode::No),
        Some("yes") => Ok(AnsiMode::Yes),
        Some("truecolor") => Ok(AnsiMode::TrueColor),
        Some(_) => Err(ConfigError::IllegalAnsiSupport),
    }
}

/// Resolves `--pick`: a plain pick number, or `last`/`last+N`/`last-N`
/// resuming from the persisted-pick file (spec §6 "Persisted state").
fn resolve_start_pick(raw: &str, pickfile_path: &std::path::Path) -> Result<i32> {
    if let Some(rest) = raw.strip_prefix("last") {
        let offset: i32 = if rest.is_empty() {
            0
        } else {
            rest.parse().map_err(|_| ConfigError::BadPickValue(raw.to_string()))?
        };
        return Ok(match pickfile::read(pickfile_path) {
            Some(base) => {
                let resumed = base + offset;
                tracing::info!(pick = resumed, "continuing at persisted pick");
                resumed
            }
            None => {
                tracing::warn!("failed to fetch previous pick, starting at pick 1");
                1
            }
        });
    }
    raw.parse().map_err(|_| ConfigError::BadPickValue(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(draft: &str) -> Cli {
        Cli {
            draft_path: PathBuf::from(draft),
            cd1: false,
            cd2: false,
            cd3: false,
            cd4: false,
            net: false,
            pick: None,
            picks: None,
            tabby: None,
            tabby_pattern: None,
            tabby_color: None,
            threading: false,
            loom_device: Some("/dev/ttyUSB0".into()),
            loom_address: None,
            shafts: Some("8".into()),
            dobby_type: None,
            color_alert: None,
            ascii: false,
            ansi: None,
            findloom: false,
            log: false,
            check: false,
        }
    }

    #[test]
    fn missing_generation_is_an_error() {
        let c = cli("x.wif");
        assert_eq!(Options::resolve(c).unwrap_err(), ConfigError::MissingGeneration);
    }

    #[test]
    fn resolves_a_basic_serial_configuration() {
        let mut c = cli("x.wif");
        c.cd3 = true;
        let opts = Options::resolve(c).unwrap();
        assert_eq!(opts.generation, Generation::Gen3);
        assert_eq!(opts.max_shafts, Some(8));
        assert!(matches!(opts.loom_address, LoomAddress::Serial(_)));
        assert_eq!(opts.start_pick, 1);
    }

    #[test]
    fn illegal_shaft_count_is_rejected() {
        let mut c = cli("x.wif");
        c.cd3 = true;
        c.shafts = Some("7".into());
        assert_eq!(
            Options::resolve(c).unwrap_err(),
            ConfigError::IllegalShaftCount
        );
    }

    #[test]
    fn net_flag_without_gen4_is_rejected() {
        let mut c = cli("x.wif");
        c.cd3 = true;
        c.net = true;
        assert_eq!(
            Options::resolve(c).unwrap_err(),
            ConfigError::NetworkRequiresGen4
        );
    }

    #[test]
    fn gen4_network_mode_resolves_tcp_address() {
        let mut c = cli("x.wif");
        c.cd4 = true;
        c.net = true;
        c.loom_device = None;
        c.shafts = None;
        c.loom_address = Some("10.0.0.5".into());
        let opts = Options::resolve(c).unwrap();
        assert_eq!(opts.loom_address, LoomAddress::Tcp("10.0.0.5".into(), GEN4_PORT));
        assert_eq!(opts.max_shafts, None);
    }

    #[test]
    fn tabby_pattern_flags_match_the_letters_position() {
        assert_eq!(TabbyPattern::XAyB.flags(), (true, true));
        assert_eq!(TabbyPattern::AxBy.flags(), (false, true));
        assert_eq!(TabbyPattern::XByA.flags(), (true, false));
        assert_eq!(TabbyPattern::BxAy.flags(), (false, false));
    }

    #[test]
    fn tabby_spec_parses_shaft_assignment() {
        let (a, b) = parse_tabby_spec("aabb").unwrap();
        assert_eq!(a, 0b0011);
        assert_eq!(b, 0b1100);
    }

    #[test]
    fn start_pick_last_without_a_pickfile_falls_back_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".drawboypick");
        assert_eq!(resolve_start_pick("last", &path).unwrap(), 1);
    }

    #[test]
    fn start_pick_last_plus_n_offsets_the_persisted_pick() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".drawboypick");
        pickfile::write(&path, 10).unwrap();
        assert_eq!(resolve_start_pick("last+2", &path).unwrap(), 12);
    }
}
