pub(crate) mod handles;
pub(crate) mod preview;
pub(crate) mod quality;
pub(crate) mod shared;
pub(crate) mod tiers;
pub(crate) mod timer;
