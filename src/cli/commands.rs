use clap::Subcommand;

use super::config::ConfigArgs;
use super::rehearse::RehearseArgs;
use super::run::RunArgs;
use super::rut::RutArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run the guest checkout against the live storefront
    Run(RunArgs),

    /// Run the guest checkout against the in-memory storefront
    Rehearse(RehearseArgs),

    /// Generate RUT identifiers
    Rut(RutArgs),

    /// Manage storeprobe configuration
    Config(ConfigArgs),
}
