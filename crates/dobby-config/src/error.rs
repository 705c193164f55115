//! User-input configuration errors (spec §7 "User-input errors"): bad CLI
//! combinations, bad tabby specs, bad colors. All of these map to exit code
//! 4 at the binary's top level.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Option Compu-dobby generation is required: --cd1, --cd2, --cd3, or --cd4.")]
    MissingGeneration,

    #[error("Option loom device path or loom network address is required: --loomDevice or --loomAddress.")]
    MissingLoomTarget,

    #[error("Option loom network address is required for network mode: --loomAddress.")]
    MissingLoomAddress,

    #[error("Network mode is only available with Compu-Dobby IV.")]
    NetworkRequiresGen4,

    #[error("Number of shafts on the loom is required: --shafts.")]
    MissingShaftCount,

    #[error("Illegal shaft count.")]
    IllegalShaftCount,

    #[error("Argument 'PICK' received invalid value type '{0}'")]
    BadPickValue(String),

    #[error("Illegal tabby spec.")]
    IllegalTabbySpec,

    #[error("Illegal dobby type.")]
    IllegalDobbyType,

    #[error("Illegal tabby pattern.")]
    IllegalTabbyPattern,

    #[error("Illegal color alert.")]
    IllegalColorAlert,

    #[error("Illegal ANSI support level.")]
    IllegalAnsiSupport,

    #[error(transparent)]
    Color(#[from] dobby_color::ColorError),
}
