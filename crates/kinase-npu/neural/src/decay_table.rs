// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Precomputed no-input decay tables for CaP and CaD.
//!
//! After a spike the cascade decays without input until the next one. The
//! tables hold that decay on a regular (P, M) / (D, P, M) grid for every
//! elapsed cycle up to `t_max`, so the state at the next spike can be looked
//! up instead of integrated.
//!
//! Tables are large and depend only on the time constants and grid layout.
//! [`DecayTableCache`] shares built tables between owners with the same
//! parameters.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::cascade::{CalciumCascade, CascadeTimeConstants};
use crate::types::{CalciumError, CascadeState, Result};

/// Upper bound on elements in a single table
pub const MAX_TABLE_ELEMENTS: usize = 1 << 30;

/// Grid layout and time constants for a pair of decay tables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayTableParams {
    pub m_tau: f32,
    pub p_tau: f32,
    pub d_tau: f32,
    /// Grid resolution along every calcium axis
    pub y_res: f32,
    /// Largest CaM value on the grid
    pub m_max: f32,
    /// Largest CaP / CaD value on the grid
    pub pd_max: f32,
    /// Longest tabulated interval in cycles
    pub t_max: usize,
}

impl Default for DecayTableParams {
    fn default() -> Self {
        let tc = CascadeTimeConstants::default();
        Self {
            m_tau: tc.m_tau(),
            p_tau: tc.p_tau(),
            d_tau: tc.d_tau(),
            y_res: 0.02,
            m_max: 2.8,
            pd_max: 1.8,
            t_max: 100,
        }
    }
}

impl DecayTableParams {
    pub fn from_time_constants(tc: &CascadeTimeConstants) -> Self {
        Self {
            m_tau: tc.m_tau(),
            p_tau: tc.p_tau(),
            d_tau: tc.d_tau(),
            ..Self::default()
        }
    }

    /// Number of grid points along the M axis
    pub fn m_points(&self) -> usize {
        (self.m_max / self.y_res).round() as usize + 1
    }

    /// Number of grid points along the P and D axes
    pub fn pd_points(&self) -> usize {
        (self.pd_max / self.y_res).round() as usize + 1
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.y_res > 0.0) || !self.y_res.is_finite() {
            return Err(CalciumError::InvalidTableParams(format!(
                "y_res must be positive, got {}",
                self.y_res
            )));
        }
        if !(self.m_max >= self.y_res) || !(self.pd_max >= self.y_res) {
            return Err(CalciumError::InvalidTableParams(format!(
                "m_max ({}) and pd_max ({}) must span at least one y_res step ({})",
                self.m_max, self.pd_max, self.y_res
            )));
        }
        let pn = self.pd_points();
        let d_len = pn
            .checked_mul(pn)
            .and_then(|n| n.checked_mul(self.m_points()))
            .and_then(|n| n.checked_mul(self.t_max + 1));
        match d_len {
            Some(n) if n <= MAX_TABLE_ELEMENTS => {}
            _ => {
                return Err(CalciumError::InvalidTableParams(format!(
                    "CaD table for {:?} exceeds {} elements",
                    self, MAX_TABLE_ELEMENTS
                )))
            }
        }
        CascadeTimeConstants::new(self.m_tau, self.p_tau, self.d_tau)?;
        Ok(())
    }

    fn key(&self) -> DecayTableKey {
        DecayTableKey([
            self.m_tau.to_bits(),
            self.p_tau.to_bits(),
            self.d_tau.to_bits(),
            self.y_res.to_bits(),
            self.m_max.to_bits(),
            self.pd_max.to_bits(),
            self.t_max as u32,
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DecayTableKey([u32; 7]);

/// CaP[P, M, T] and CaD[D, P, M, T]; index T is the state after T cycles
#[derive(Debug, Clone)]
pub struct DecayTables {
    params: DecayTableParams,
    m_points: usize,
    pd_points: usize,
    t_points: usize,
    ca_p: Vec<f32>,
    ca_d: Vec<f32>,
}

impl DecayTables {
    /// Build both tables by stepping the no-input cascade from every grid point
    pub fn build(params: DecayTableParams) -> Result<Self> {
        params.validate()?;
        let tc = CascadeTimeConstants::new(params.m_tau, params.p_tau, params.d_tau)?;
        let cascade = CalciumCascade::new(tc);

        let mn = params.m_points();
        let pn = params.pd_points();
        let tn = params.t_max + 1;

        let mut ca_p = vec![0.0; pn * mn * tn];
        for pi in 0..pn {
            for mi in 0..mn {
                let mut state =
                    CascadeState::new(mi as f32 * params.y_res, pi as f32 * params.y_res, 0.0);
                let base = (pi * mn + mi) * tn;
                for slot in &mut ca_p[base..base + tn] {
                    *slot = state.ca_p;
                    cascade.step_from_level(0.0, &mut state);
                }
            }
        }
        info!(
            target: "kinase-neural",
            "CaP decay table has {} elements", ca_p.len()
        );

        let mut ca_d = vec![0.0; pn * pn * mn * tn];
        for di in 0..pn {
            for pi in 0..pn {
                for mi in 0..mn {
                    let mut state = CascadeState::new(
                        mi as f32 * params.y_res,
                        pi as f32 * params.y_res,
                        di as f32 * params.y_res,
                    );
                    let base = ((di * pn + pi) * mn + mi) * tn;
                    for slot in &mut ca_d[base..base + tn] {
                        *slot = state.ca_d;
                        cascade.step_from_level(0.0, &mut state);
                    }
                }
            }
        }
        info!(
            target: "kinase-neural",
            "CaD decay table has {} elements ({} MiB)",
            ca_d.len(),
            ca_d.len() * std::mem::size_of::<f32>() / (1024 * 1024)
        );

        Ok(Self {
            params,
            m_points: mn,
            pd_points: pn,
            t_points: tn,
            ca_p,
            ca_d,
        })
    }

    pub fn params(&self) -> &DecayTableParams {
        &self.params
    }

    /// Raw CaP table entry
    pub fn ca_p_at(&self, pi: usize, mi: usize, t: usize) -> f32 {
        self.ca_p[(pi * self.m_points + mi) * self.t_points + t]
    }

    /// Raw CaD table entry
    pub fn ca_d_at(&self, di: usize, pi: usize, mi: usize, t: usize) -> f32 {
        self.ca_d[((di * self.pd_points + pi) * self.m_points + mi) * self.t_points + t]
    }

    /// CaP `t` cycles after a spike that left the cascade at (`p`, `m`)
    pub fn p_from_last_spike(&self, p: f32, m: f32, t: i32) -> f32 {
        let t = self.clip_t(t);
        let (pi, pr) = self.cell(p, self.pd_points);
        let (mi, mr) = self.cell(m, self.m_points);

        let mut y = 0.0;
        for (po, pw) in [(0, 1.0 - pr), (1, pr)] {
            for (mo, mw) in [(0, 1.0 - mr), (1, mr)] {
                y += pw * mw * self.ca_p_at(pi + po, mi + mo, t);
            }
        }
        y
    }

    /// CaD `t` cycles after a spike that left the cascade at (`d`, `p`, `m`)
    pub fn d_from_last_spike(&self, d: f32, p: f32, m: f32, t: i32) -> f32 {
        let t = self.clip_t(t);
        let (di, dr) = self.cell(d, self.pd_points);
        let (pi, pr) = self.cell(p, self.pd_points);
        let (mi, mr) = self.cell(m, self.m_points);

        let mut y = 0.0;
        for (dof, dw) in [(0, 1.0 - dr), (1, dr)] {
            for (po, pw) in [(0, 1.0 - pr), (1, pr)] {
                for (mo, mw) in [(0, 1.0 - mr), (1, mr)] {
                    y += dw * pw * mw * self.ca_d_at(di + dof, pi + po, mi + mo, t);
                }
            }
        }
        y
    }

    fn clip_t(&self, t: i32) -> usize {
        (t.max(0) as usize).min(self.t_points - 1)
    }

    /// Lower grid index and fractional offset for `v`, clipped so the upper
    /// neighbour stays on the grid
    fn cell(&self, v: f32, points: usize) -> (usize, f32) {
        let top = (points - 1) as f32;
        let x = (v / self.params.y_res).clamp(0.0, top);
        let i = (x.floor() as usize).min(points - 2);
        (i, x - i as f32)
    }
}

/// Shared, parameter-keyed store of built decay tables.
///
/// Owned by whoever runs the simulation; clones of the returned `Arc` stay
/// valid after [`DecayTableCache::clear`].
#[derive(Debug, Default)]
pub struct DecayTableCache {
    tables: RwLock<AHashMap<DecayTableKey, Arc<DecayTables>>>,
}

impl DecayTableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return tables for `params`, building them on first use.
    /// The flag is true when the tables already existed.
    pub fn get_or_build(&self, params: &DecayTableParams) -> Result<(Arc<DecayTables>, bool)> {
        let key = params.key();
        if let Some(tables) = self.tables.read().get(&key) {
            return Ok((Arc::clone(tables), true));
        }

        // Build outside the lock; a concurrent builder for the same key loses
        let built = Arc::new(DecayTables::build(*params)?);
        let mut tables = self.tables.write();
        if let Some(existing) = tables.get(&key) {
            debug!(target: "kinase-neural", "Decay tables built concurrently, keeping first");
            return Ok((Arc::clone(existing), true));
        }
        tables.insert(key, Arc::clone(&built));
        Ok((built, false))
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }

    pub fn clear(&self) {
        self.tables.write().clear();
    }
}
