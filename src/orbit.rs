/// Keplerian orbital mechanics
///
/// Stateless conversions between Cartesian state vectors and classical
/// orbital elements, plus the time-of-flight and anomaly solvers the
/// integrator and reference frame tree consume. Formulas follow the
/// standard curricula for two-body mechanics; angles are radians and are
/// not pre-normalized (callers normalize on demand).
///
/// Element naming:
///   h    = magnitude of specific angular momentum
///   incl = inclination
///   raan = longitude (right ascension) of the ascending node
///   ecc  = eccentricity
///   argp = argument of periapsis
///   ta   = true anomaly
///   mu   = standard gravitational parameter of the primary body

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

/// Convergence tolerance for the eccentric / hyperbolic anomaly solvers.
const ANOMALY_TOLERANCE: f64 = 1e-6;
/// Iteration bound; exceeding it is a data error, not "good enough".
const MAX_SOLVER_ITERATIONS: u32 = 100;

/// Magnitudes below this are treated as degenerate (circular/equatorial).
const DEGENERATE_EPS: f64 = 1e-11;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum OrbitError {
    #[error("anomaly solver did not converge after {iterations} iterations (residual {residual:e})")]
    NoConvergence { iterations: u32, residual: f64 },
    #[error("true anomaly {ta} lies outside the asymptotes of a hyperbolic orbit")]
    OutsideAsymptote { ta: f64 },
}

/// Classical orbital elements plus the primary's gravitational parameter.
///
/// Recomputed (never mutated in place) every tick for orbiting entities;
/// for those entities this is the authoritative position representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Oe {
    pub h: f64,
    pub incl: f64,
    pub raan: f64,
    pub ecc: f64,
    pub argp: f64,
    pub ta: f64,
    pub mu: f64,
}

impl Oe {
    /// Derive orbital elements from a frame-local position and velocity.
    ///
    /// Degenerate geometries (equatorial orbits with a vanishing node line,
    /// circular orbits with a vanishing eccentricity vector) fall back to a
    /// zero angle instead of dividing by zero.
    pub fn from_state_vector(pos: DVec3, vel: DVec3, mu: f64) -> Self {
        let r = pos.length();
        let v = vel.length();
        let vr = pos.dot(vel) / r;

        let h_vec = pos.cross(vel);
        let h = h_vec.length();

        let incl = safe_acos(h_vec.z / h);

        // node line: intersection of orbital and equatorial planes
        let n_vec = DVec3::Z.cross(h_vec);
        let n = n_vec.length();

        let raan = if n > DEGENERATE_EPS {
            let mut l = safe_acos(n_vec.x / n);
            if n_vec.y < 0.0 {
                l = TWO_PI - l;
            }
            l
        } else {
            0.0
        };

        let e_vec = (pos * (v * v - mu / r) - vel * (r * vr)) / mu;
        let ecc = e_vec.length();

        let argp = if n > DEGENERATE_EPS && ecc > DEGENERATE_EPS {
            let mut w = safe_acos(n_vec.dot(e_vec) / (n * ecc));
            if e_vec.z < 0.0 {
                w = TWO_PI - w;
            }
            w
        } else {
            0.0
        };

        let ta = if ecc > DEGENERATE_EPS {
            let mut f = safe_acos(e_vec.dot(pos) / (ecc * r));
            if vr < 0.0 {
                f = TWO_PI - f;
            }
            f
        } else if n > DEGENERATE_EPS {
            // circular inclined: measure from the ascending node
            let mut f = safe_acos(n_vec.dot(pos) / (n * r));
            if n_vec.dot(vel) > 0.0 {
                f = TWO_PI - f;
            }
            f
        } else {
            // circular equatorial: measure from +X
            let mut f = safe_acos(pos.x / r);
            if vel.x > 0.0 {
                f = TWO_PI - f;
            }
            f
        };

        Oe { h, incl, raan, ecc, argp, ta, mu }
    }

    /// Frame-local position and velocity at the current true anomaly:
    /// perifocal state rotated through the classical 3-1-3 Euler matrix
    /// built from raan, incl and argp.
    pub fn to_state_vector(&self) -> (DVec3, DVec3) {
        let (sin_ta, cos_ta) = self.ta.sin_cos();

        let r = (self.h * self.h / self.mu) / (1.0 + self.ecc * cos_ta);
        let r_pf = DVec3::new(r * cos_ta, r * sin_ta, 0.0);
        let v_pf = DVec3::new(-sin_ta, self.ecc + cos_ta, 0.0) * (self.mu / self.h);

        let rot = DMat3::from_rotation_z(self.raan)
            * DMat3::from_rotation_x(self.incl)
            * DMat3::from_rotation_z(self.argp);

        (rot * r_pf, rot * v_pf)
    }

    /// Orbit parameter p = h^2 / mu (semi-latus rectum).
    fn semi_latus_rectum(&self) -> f64 {
        self.h * self.h / self.mu
    }

    /// Semimajor axis; +infinity for a parabolic orbit, negative for a
    /// hyperbolic one (standard convention).
    pub fn semimajor_axis(&self) -> f64 {
        let one_minus_e2 = 1.0 - self.ecc * self.ecc;
        if one_minus_e2.abs() < DEGENERATE_EPS {
            f64::INFINITY
        } else {
            self.semi_latus_rectum() / one_minus_e2
        }
    }

    pub fn semiminor_axis(&self) -> f64 {
        let a = self.semimajor_axis();
        if self.ecc < 1.0 {
            a * (1.0 - self.ecc * self.ecc).sqrt()
        } else if a.is_infinite() {
            f64::INFINITY
        } else {
            a.abs() * (self.ecc * self.ecc - 1.0).sqrt()
        }
    }

    pub fn periapsis(&self) -> f64 {
        self.semi_latus_rectum() / (1.0 + self.ecc)
    }

    /// +infinity for parabolic and hyperbolic orbits.
    pub fn apoapsis(&self) -> f64 {
        if self.ecc >= 1.0 {
            f64::INFINITY
        } else {
            self.semi_latus_rectum() / (1.0 - self.ecc)
        }
    }

    /// Distance from the primary's focus at the given true anomaly.
    pub fn radius_at(&self, ta: f64) -> f64 {
        self.semi_latus_rectum() / (1.0 + self.ecc * ta.cos())
    }

    /// Instantaneous speed from the vis-viva relation at the current
    /// true anomaly.
    pub fn speed(&self) -> f64 {
        let r = self.radius_at(self.ta);
        if (self.ecc - 1.0).abs() < DEGENERATE_EPS {
            (2.0 * self.mu / r).sqrt()
        } else {
            (self.mu * (2.0 / r - 1.0 / self.semimajor_axis())).sqrt()
        }
    }

    /// Orbital period; +infinity for non-elliptical orbits.
    pub fn period(&self) -> f64 {
        if self.ecc >= 1.0 {
            return f64::INFINITY;
        }
        let a = self.semimajor_axis();
        TWO_PI * (a * a * a / self.mu).sqrt()
    }

    /// Mean motion equivalent `mu^2 / h^3`, the common factor of the
    /// time-of-flight relations.
    fn mu2_over_h3(&self) -> f64 {
        self.mu * self.mu / (self.h * self.h * self.h)
    }

    /// Time elapsed since periapsis passage at the current true anomaly.
    /// Negative for anomalies approaching periapsis (elliptic values are
    /// congruent modulo the period).
    pub fn time_since_periapsis(&self) -> Result<f64, OrbitError> {
        if self.ecc < DEGENERATE_EPS {
            // circular
            let n = self.mu2_over_h3();
            return Ok(normalize_angle(self.ta) / n);
        }
        if self.ecc < 1.0 {
            // elliptic: eccentric anomaly then Kepler's equation
            let ea = 2.0
                * (((1.0 - self.ecc) / (1.0 + self.ecc)).sqrt() * (self.ta / 2.0).tan()).atan();
            let me = ea - self.ecc * ea.sin();
            let n = self.mu2_over_h3() * (1.0 - self.ecc * self.ecc).powf(1.5);
            return Ok(me / n);
        }
        if self.ecc > 1.0 {
            // hyperbolic: the anomaly only exists between the asymptotes
            let x = ((self.ecc - 1.0) / (self.ecc + 1.0)).sqrt() * (self.ta / 2.0).tan();
            if x.abs() >= 1.0 {
                return Err(OrbitError::OutsideAsymptote { ta: self.ta });
            }
            let f = 2.0 * x.atanh();
            let mh = self.ecc * f.sinh() - f;
            let n = self.mu2_over_h3() * (self.ecc * self.ecc - 1.0).powf(1.5);
            return Ok(mh / n);
        }
        // parabolic (Barker's equation)
        let half = (self.ta / 2.0).tan();
        let mp = 0.5 * half + half * half * half / 6.0;
        Ok(mp / self.mu2_over_h3())
    }

    /// True anomaly at time `t`, given the time of periapsis passage
    /// `t_periapsis`. Dispatches on orbit type: closed forms for circular
    /// and parabolic orbits, Newton-Raphson for elliptic and hyperbolic.
    /// The result is normalized into [0, 2*pi).
    pub fn true_anomaly_from_time(&self, t_periapsis: f64, t: f64) -> Result<f64, OrbitError> {
        let dt = t - t_periapsis;

        if self.ecc < DEGENERATE_EPS {
            return Ok(normalize_angle(self.mu2_over_h3() * dt));
        }
        if self.ecc < 1.0 {
            let n = self.mu2_over_h3() * (1.0 - self.ecc * self.ecc).powf(1.5);
            let me = normalize_angle(n * dt);
            let ea = solve_kepler_elliptic(me, self.ecc)?;
            let ta = 2.0
                * (((1.0 + self.ecc) / (1.0 - self.ecc)).sqrt() * (ea / 2.0).tan()).atan();
            return Ok(normalize_angle(ta));
        }
        if self.ecc > 1.0 {
            let mh = self.mu2_over_h3() * (self.ecc * self.ecc - 1.0).powf(1.5) * dt;
            let f = solve_kepler_hyperbolic(mh, self.ecc)?;
            let ta = 2.0
                * (((self.ecc + 1.0) / (self.ecc - 1.0)).sqrt() * (f / 2.0).tanh()).atan();
            return Ok(normalize_angle(ta));
        }
        // parabolic: Barker's equation has a closed-form root
        let mp = self.mu2_over_h3() * dt;
        let z = (3.0 * mp + ((3.0 * mp) * (3.0 * mp) + 1.0).sqrt()).cbrt();
        Ok(normalize_angle(2.0 * (z - 1.0 / z).atan()))
    }
}

/// Newton-Raphson on Kepler's equation `E - e*sin(E) = Me`.
fn solve_kepler_elliptic(me: f64, ecc: f64) -> Result<f64, OrbitError> {
    let mut ea = if me < std::f64::consts::PI {
        me + ecc / 2.0
    } else {
        me - ecc / 2.0
    };
    for _ in 0..MAX_SOLVER_ITERATIONS {
        let ratio = (ea - ecc * ea.sin() - me) / (1.0 - ecc * ea.cos());
        ea -= ratio;
        if ratio.abs() < ANOMALY_TOLERANCE {
            return Ok(ea);
        }
    }
    Err(OrbitError::NoConvergence {
        iterations: MAX_SOLVER_ITERATIONS,
        residual: (ea - ecc * ea.sin() - me).abs(),
    })
}

/// Newton-Raphson on the hyperbolic Kepler equation `e*sinh(F) - F = Mh`.
fn solve_kepler_hyperbolic(mh: f64, ecc: f64) -> Result<f64, OrbitError> {
    // logarithmic starting estimate keeps sinh out of overflow territory
    let mut f = mh.signum() * (2.0 * mh.abs() / ecc + 1.8).ln();
    for _ in 0..MAX_SOLVER_ITERATIONS {
        let ratio = (ecc * f.sinh() - f - mh) / (ecc * f.cosh() - 1.0);
        f -= ratio;
        if ratio.abs() < ANOMALY_TOLERANCE {
            return Ok(f);
        }
    }
    Err(OrbitError::NoConvergence {
        iterations: MAX_SOLVER_ITERATIONS,
        residual: (ecc * f.sinh() - f - mh).abs(),
    })
}

/// acos clamped against floating point spill just outside [-1, 1].
fn safe_acos(x: f64) -> f64 {
    x.clamp(-1.0, 1.0).acos()
}

/// Normalize an angle into [0, 2*pi).
pub fn normalize_angle(a: f64) -> f64 {
    let r = a % TWO_PI;
    if r < 0.0 {
        r + TWO_PI
    } else {
        r
    }
}
