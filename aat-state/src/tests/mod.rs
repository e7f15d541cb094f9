pub(crate) mod fixtures;
pub(crate) mod test_helpers;
