pub(crate) mod audio;
pub(crate) mod recorded;
pub(crate) mod scheduler;
pub(crate) mod session;
pub(crate) mod synthesis;
pub(crate) mod viseme;
