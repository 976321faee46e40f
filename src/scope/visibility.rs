//! Solo/mute/freeze resolution across the channels of one instance.

use serde::Serialize;

use super::params::ChannelSwitches;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Visibility {
    pub frozen: bool,
    pub visible: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            frozen: false,
            visible: true,
        }
    }
}

/// Any solo hides every non-solo channel regardless of mute. Without a solo,
/// mute hides. Freeze is the global switch or, on multi-channel layouts, the
/// channel's own switch.
pub fn resolve<'a, I>(switches: I, global_freeze: bool, multichannel: bool) -> impl Iterator<Item = Visibility>
where
    I: IntoIterator<Item = &'a ChannelSwitches>,
    I::IntoIter: Clone,
{
    let switches = switches.into_iter();
    let has_solo = multichannel && switches.clone().any(|s| s.solo);
    switches.map(move |s| {
        if !multichannel {
            return Visibility {
                frozen: global_freeze,
                visible: true,
            };
        }
        Visibility {
            frozen: global_freeze || s.freeze,
            visible: if has_solo { s.solo } else { !s.mute },
        }
    })
}
