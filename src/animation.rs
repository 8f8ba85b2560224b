pub(crate) mod blink;
