//! # Dynamic follow
//!
//! Chooses the following time-gap from the ego speed and the behaviour of the
//! lead, and keeps a short history of the lead's speed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::VecDeque;

use util::maths::{clamp, interp, round_to};

use super::{LeadGeometry, TR_MAX, TR_MIN};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Rate at which lead samples are recorded.
pub const HISTORY_RATE_HZ: usize = 20;

/// Capacity of the short lead speed history, 3 seconds of samples.
pub const LEAD_VELS_CAPACITY: usize = 3 * HISTORY_RATE_HZ;

/// Capacity of the traffic history, 3 minutes of 1 Hz samples.
pub const TRAFFIC_VELS_CAPACITY: usize = 180;

/// Below this speed the time-gap ramps towards the crawl value and ignores
/// the lead.
///
/// Units: meters/second (15 mph)
pub const DYN_FOLLOW_MIN_SPEED_MS: f64 = 6.7056;

const SPEED_BP: [f64; 7] = [0.0, 5.222, 11.164, 14.937, 20.973, 33.975, 42.469];
const SPEED_TR: [f64; 7] = [1.542, 1.553, 1.599, 1.68, 1.75, 1.855, 1.9];

/// Crawl ramp from 10 mph to 15 mph.
const CRAWL_BP: [f64; 2] = [4.4704, DYN_FOLLOW_MIN_SPEED_MS];
const CRAWL_TR: f64 = 1.8;

const REL_VEL_BP: [f64; 14] = [
    -15.6464, -9.8422, -6.0, -4.0, -2.68, -2.3, -1.8, -1.26, -0.61, 0.0, 0.61, 1.26, 2.1, 2.68,
];
const REL_VEL_MOD: [f64; 14] = [
    0.504, 0.34, 0.29, 0.25, 0.22, 0.19, 0.13, 0.053, 0.017, 0.0, -0.015, -0.042, -0.108, -0.163,
];

const LEAD_ACCEL_BP: [f64; 9] = [-2.235, -1.49, -1.1, -0.67, -0.224, 0.0, 0.67, 1.1, 1.49];
const LEAD_ACCEL_MOD: [f64; 9] = [0.26, 0.182, 0.104, 0.052, 0.039, 0.0, -0.016, -0.032, -0.056];

/// Lane change reduction at 20, 50 and 70 mph.
const BLINKER_BP: [f64; 3] = [8.9408, 22.352, 31.2928];
const BLINKER_FACTOR: [f64; 3] = [1.0, 0.8, 0.75];

const TRAFFIC_DIFF_BP: [f64; 7] = [0.0, 0.21, 0.466, 0.722, 0.856, 0.96, 1.0];
const TRAFFIC_MOD: [f64; 7] = [1.2, 1.19, 1.17, 1.13, 1.09, 1.04, 1.0];

/// The traffic level fades out below 45 mph.
const TRAFFIC_SPEED_BP: [f64; 2] = [20.1168, 24.5872];
const TRAFFIC_SPEED_MOD: [f64; 2] = [0.2, 0.0];

/// Minimum number of traffic samples before a level is estimated.
const TRAFFIC_MIN_SAMPLES: usize = 20;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A FIFO buffer holding at most `capacity` items, evicting the oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

/// Rolling history of the lead's speed.
#[derive(Debug, Clone)]
pub struct LeadHistory {
    /// Every lead speed over the last 3 seconds, cleared when the lead goes
    lead_vels: BoundedBuffer<f64>,

    /// One lead speed per second over the last 3 minutes, kept across leads
    traffic_vels: BoundedBuffer<f64>,

    /// Cycles since the last traffic sample
    frame: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push an item to the back, evicting from the front while full.
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        while self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn first(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl Default for LeadHistory {
    fn default() -> Self {
        Self {
            lead_vels: BoundedBuffer::new(LEAD_VELS_CAPACITY),
            traffic_vels: BoundedBuffer::new(TRAFFIC_VELS_CAPACITY),
            frame: 0,
        }
    }
}

impl LeadHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this cycle's lead speed, or `None` if there is no lead.
    pub fn record(&mut self, v_lead: Option<f64>) {
        match v_lead {
            Some(v) => {
                self.lead_vels.push(v);

                self.frame += 1;
                if self.frame >= HISTORY_RATE_HZ {
                    self.traffic_vels.push(v);
                    self.frame = 0;
                }
            }
            // Traffic samples outlive the lead
            None => self.lead_vels.clear(),
        }
    }

    /// Acceleration of the lead over the short history, zero until more than
    /// two seconds of samples exist.
    ///
    /// Units: meters/second^2
    pub fn lead_accel_estimate(&self) -> f64 {
        if self.lead_vels.len() <= 2 * HISTORY_RATE_HZ {
            return 0.0;
        }

        match (self.lead_vels.first(), self.lead_vels.last()) {
            (Some(first), Some(last)) => {
                let duration_s = self.lead_vels.len() as f64 / HISTORY_RATE_HZ as f64;
                (last - first) / duration_s
            }
            _ => 0.0,
        }
    }

    /// Multiplier on the time-gap reflecting how much the lead's speed has
    /// been fluctuating, at least 1.
    pub fn traffic_level(&self, v_ego: f64) -> f64 {
        if self.traffic_vels.len() < TRAFFIC_MIN_SAMPLES {
            return 1.0;
        }

        let vels: Vec<f64> = self.traffic_vels.iter().copied().collect();
        let diffs: Vec<f64> = vels.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
        let mean_diff = diffs.iter().sum::<f64>() / diffs.len() as f64;

        let traffic_mod = interp(mean_diff, &TRAFFIC_DIFF_BP, &TRAFFIC_MOD);
        let speed_mod = interp(v_ego, &TRAFFIC_SPEED_BP, &TRAFFIC_SPEED_MOD);

        (traffic_mod - speed_mod).max(1.0)
    }

    pub fn lead_vels(&self) -> &BoundedBuffer<f64> {
        &self.lead_vels
    }

    pub fn traffic_vels(&self) -> &BoundedBuffer<f64> {
        &self.traffic_vels
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Following time-gap for the given ego speed and lead.
///
/// `traffic_mod` multiplies the time-gap of a lead before it is clamped, pass
/// 1.0 to disable it.
///
/// Units: seconds
pub fn dynamic_follow(
    v_ego: f64,
    lead: Option<&LeadGeometry>,
    blinkers: bool,
    traffic_mod: f64,
) -> f64 {
    if v_ego <= DYN_FOLLOW_MIN_SPEED_MS {
        // Get slightly closer when stopping, smoothly ramping back up to the
        // speed curve at 15 mph
        let crawl_tr = [
            CRAWL_TR,
            interp(DYN_FOLLOW_MIN_SPEED_MS, &SPEED_BP, &SPEED_TR),
        ];
        return round_to(interp(v_ego, &CRAWL_BP, &crawl_tr), 3);
    }

    let mut tr = interp(v_ego, &SPEED_BP, &SPEED_TR);

    let lead = match lead {
        Some(l) => l,
        None => return tr,
    };

    tr += interp(lead.v_lead - v_ego, &REL_VEL_BP, &REL_VEL_MOD);
    tr += interp(lead.a_lead, &LEAD_ACCEL_BP, &LEAD_ACCEL_MOD);

    if blinkers {
        tr *= interp(v_ego, &BLINKER_BP, &BLINKER_FACTOR);
    }

    tr *= traffic_mod;

    clamp(&round_to(tr, 3), &TR_MIN, &TR_MAX)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
