//! Multi-octave fractal Brownian motion (fBm) terrain.
//!
//! Composites octaves of simplex noise so the height field carries detail at
//! many spatial frequencies, which is exactly what makes adaptive patch
//! subdivision worthwhile.

use noise::{NoiseFn, Simplex};

use crate::HeightSource;

/// Configuration for the fBm noise terrain.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseParams {
    /// Seed for deterministic generation.
    pub seed: u64,
    /// Number of noise octaves to composite.
    pub octaves: u32,
    /// Frequency multiplier between successive octaves. Default: 2.0.
    pub lacunarity: f64,
    /// Amplitude multiplier between successive octaves. Default: 0.5.
    pub persistence: f64,
    /// Frequency of the first octave, in cycles per world unit. Default: 0.004.
    pub base_frequency: f64,
    /// Amplitude of the first octave in world units. Default: 120.0.
    pub amplitude: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 6,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 0.004,
            amplitude: 120.0,
        }
    }
}

/// Procedural height field built from fBm simplex noise.
pub struct NoiseTerrain {
    noise: Simplex,
    params: NoiseParams,
    area: (f32, f32),
}

impl NoiseTerrain {
    pub fn new(params: NoiseParams) -> Self {
        let noise = Simplex::new(params.seed as u32);
        Self {
            noise,
            params,
            area: (0.0, 0.0),
        }
    }

    /// Raw fBm value at `(x, z)`, in world units.
    pub fn sample(&self, x: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;

        for _ in 0..self.params.octaves {
            total += self.noise.get([x * frequency, z * frequency]) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        total
    }

    /// Theoretical maximum absolute height (geometric series of the octave amplitudes).
    pub fn max_amplitude(&self) -> f64 {
        let mut sum = 0.0;
        let mut amp = self.params.amplitude;
        for _ in 0..self.params.octaves {
            sum += amp;
            amp *= self.params.persistence;
        }
        sum
    }

    pub fn params(&self) -> &NoiseParams {
        &self.params
    }

    /// Area last configured through [`HeightSource::set_area`].
    pub fn area(&self) -> (f32, f32) {
        self.area
    }
}

impl HeightSource for NoiseTerrain {
    fn height(&self, x: f32, z: f32) -> f32 {
        self.sample(f64::from(x), f64::from(z)) as f32
    }

    fn set_area(&mut self, width: f32, depth: f32) {
        // Noise is unbounded; the area is only recorded for callers.
        self.area = (width, depth);
    }
}
