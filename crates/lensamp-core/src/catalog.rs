//! Galaxy catalogs: plain-text lists of solver lens lines, one lens per line.

use rand::Rng;

use crate::error::{LensError, LensResult};
use crate::lens::SieLens;
use crate::params::ParameterGenerator;

/// Draw `count` centred SIE lenses with sampled dispersion and ellipticity.
pub fn generate<R: Rng + ?Sized>(
    generator: &ParameterGenerator,
    rng: &mut R,
    count: usize,
) -> LensResult<Vec<SieLens>> {
    (0..count).map(|_| generator.sie_lens(rng)).collect()
}

/// Non-blank lines of a catalog file, trimmed.
pub fn parse(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split into `parts` chunks of `len / parts` lenses, the last chunk taking
/// the remainder.
pub fn split(lenses: &[String], parts: usize) -> LensResult<Vec<Vec<String>>> {
    if parts == 0 {
        return Err(LensError::Config("cannot split into zero parts".into()));
    }
    if parts > lenses.len() {
        return Err(LensError::Config(format!(
            "cannot split {} lenses into {parts} parts",
            lenses.len()
        )));
    }

    let size = lenses.len() / parts;
    let mut chunks: Vec<Vec<String>> = lenses[..size * (parts - 1)]
        .chunks(size)
        .map(<[String]>::to_vec)
        .collect();
    chunks.push(lenses[size * (parts - 1)..].to_vec());
    Ok(chunks)
}
