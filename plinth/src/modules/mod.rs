//! Apps shipped with the service.

pub mod avahi;
pub mod backups;
pub mod coquelicot;
pub mod datetime;
pub mod firewall;
pub mod ikiwiki;
pub mod minidlna;
pub mod names;
pub mod openvpn;
pub mod power;
pub mod security;

use crate::app::App;
use crate::config::AppConfig;
use crate::error::Result;

/// Declarations of every built-in app, in registration order.
pub fn builtin(config: &AppConfig) -> Result<Vec<App>> {
    Ok(vec![
        names::app()?,
        firewall::app()?,
        avahi::app()?,
        datetime::app()?,
        security::app()?,
        power::app()?,
        backups::app(config)?,
        coquelicot::app()?,
        ikiwiki::app()?,
        minidlna::app()?,
        openvpn::app()?,
    ])
}
