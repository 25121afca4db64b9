//! contains small utility functions that have nowhere else to go

/// returns the crate version, it's stored in every compiled unit
pub fn get_version() -> [u16; 3] {
    let mut version = [0; 3];
    let parts = env!("CARGO_PKG_VERSION")
        .split(['.', '-', '+'])
        .map(|x| x.parse::<u16>().unwrap_or(0));
    for (slot, part) in version.iter_mut().zip(parts) {
        *slot = part;
    }
    version
}

/// collects an iterator of results into a vec, stopping at the first error
pub fn sequence_result<I, T, E>(results: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = Result<T, E>>,
{
    results.into_iter().collect()
}
