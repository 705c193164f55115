//! The CLI surface (spec §6 "CLI surface (driver)"), declared with `clap`
//! the way `ox-bin::Args` declares oxidized's. Kept a thin parsed-but-not-
//! validated struct: [`crate::Options::resolve`] does the env-var
//! fallback, cross-flag validation, and spec-shape parsing this crate adds
//! on top.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "drawboy",
    version,
    about = "AVL Compu-Dobby loom driver.",
    after_help = "Report issues to the project tracker."
)]
pub struct Cli {
    /// The path of the WIF or DTX draft file.
    pub draft_path: PathBuf,

    /// Loom has a Compu-Dobby I.
    #[arg(long)]
    pub cd1: bool,
    /// Loom has a Compu-Dobby II.
    #[arg(long)]
    pub cd2: bool,
    /// Loom has a Compu-Dobby III.
    #[arg(long)]
    pub cd3: bool,
    /// Loom has a Compu-Dobby IV.
    #[arg(long)]
    pub cd4: bool,

    /// Connect to the loom over ethernet (Compu-Dobby IV only).
    #[arg(short = 'n', long)]
    pub net: bool,

    /// The pick to start weaving at: a number, `last`, or `last+N`.
    #[arg(short, long)]
    pub pick: Option<String>,

    /// List of pick ranges in the treadling or liftplan to weave.
    #[arg(short = 'P', long)]
    pub picks: Option<String>,

    /// Which shafts are activated for tabby A and tabby B.
    #[arg(long)]
    pub tabby: Option<String>,

    /// Which pattern is used for inserted tabby picks: xAyB, AxBy, xByA, BxAy.
    #[arg(long = "tabbyPattern")]
    pub tabby_pattern: Option<String>,

    /// Color displayed for tabby picks.
    #[arg(long = "tabbycolor")]
    pub tabby_color: Option<String>,

    /// Treadle the threading, instead of the picks.
    #[arg(long)]
    pub threading: bool,

    /// The path of the loom device in the /dev directory.
    #[arg(long = "loomDevice")]
    pub loom_device: Option<String>,

    /// The network address of the loom.
    #[arg(long = "loomAddress")]
    pub loom_address: Option<String>,

    /// Number of shafts on the loom.
    #[arg(long)]
    pub shafts: Option<String>,

    /// Is the loom a positive or negative dobby (`+`/`-` also accepted).
    #[arg(long = "dobbyType")]
    pub dobby_type: Option<String>,

    /// Ring the terminal bell on color changes: none, simple, pulse, alternating.
    #[arg(long = "colorAlert")]
    pub color_alert: Option<String>,

    /// Restrict output to ASCII.
    #[arg(long)]
    pub ascii: bool,

    /// Whether the terminal supports ANSI style codes: no, yes, truecolor.
    #[arg(long)]
    pub ansi: Option<String>,

    /// Finds device files that might be the loom.
    #[arg(long)]
    pub findloom: bool,

    /// Logs loom I/O to a file under the OS temp directory.
    #[arg(long)]
    pub log: bool,

    /// Tests whether the draft file parses, without driving the loom.
    #[arg(long)]
    pub check: bool,
}
