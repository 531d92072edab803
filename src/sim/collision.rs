//! Collision detection and resolution
//!
//! Wall handling reflects the offending velocity component and clamps the
//! ball back inside the arena. Pairwise handling applies the 1-D elastic
//! collision law along the contact normal (mass-weighted, tangential
//! component untouched) plus a positional correction that removes the
//! overlap so balls cannot stick together.
//!
//! The engine runs a fixed-rate cycle under one global simulation lock:
//! snapshot positions, rebuild the quad-tree, resolve walls and candidate
//! pairs. The latest velocity is re-read before each pair so sequential
//! resolutions touching the same ball compose instead of overwriting each
//! other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use glam::DVec2;

use super::ball::{Ball, Kinematics};
use super::quadtree::{QuadTree, Rect, TreeItem};
use crate::consts::MAX_ITEMS_PER_NODE;

/// The bounded rectangular simulation area
///
/// Ball positions are the top-left corner of the bounding box, so the
/// playable range on each axis is `[0, extent - diameter - 2*border]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
    pub border: f64,
}

impl Arena {
    pub fn new(width: f64, height: f64, border: f64) -> Self {
        Self {
            width,
            height,
            border,
        }
    }

    /// Largest x a ball of the given diameter may occupy
    #[inline]
    pub fn max_x(&self, diameter: f64) -> f64 {
        self.width - diameter - 2.0 * self.border
    }

    /// Largest y a ball of the given diameter may occupy
    #[inline]
    pub fn max_y(&self, diameter: f64) -> f64 {
        self.height - diameter - 2.0 * self.border
    }

    /// Root rectangle for the spatial index
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// Reflect off arena walls and clamp back into bounds
///
/// Returns the corrected kinematics, or `None` when the ball has no
/// boundary contact (wall handling is a no-op for balls strictly inside
/// the arena). A component is only reflected while it still points
/// outward, so a ball resting exactly on a bound is not flipped again by
/// the next cycle.
pub fn bounce_off_walls(kin: &Kinematics, arena: &Arena) -> Option<Kinematics> {
    let max_x = arena.max_x(kin.diameter);
    let max_y = arena.max_y(kin.diameter);

    let mut position = kin.position;
    let mut velocity = kin.velocity;
    let mut hit = false;

    if position.x <= 0.0 {
        if velocity.x < 0.0 {
            velocity.x = -velocity.x;
            hit = true;
        }
    } else if position.x >= max_x && velocity.x > 0.0 {
        velocity.x = -velocity.x;
        hit = true;
    }

    if position.y <= 0.0 {
        if velocity.y < 0.0 {
            velocity.y = -velocity.y;
            hit = true;
        }
    } else if position.y >= max_y && velocity.y > 0.0 {
        velocity.y = -velocity.y;
        hit = true;
    }

    // Clamp any overshoot back inside the playable area
    position.x = position.x.clamp(0.0, max_x);
    position.y = position.y.clamp(0.0, max_y);
    if position != kin.position {
        hit = true;
    }

    if hit {
        Some(Kinematics {
            position,
            velocity,
            diameter: kin.diameter,
        })
    } else {
        None
    }
}

/// Resolve one candidate pair
///
/// Returns updated kinematics for both balls when they truly collide, or
/// `None` when they are apart, separating, or degenerate (coincident
/// centers, which is logged and skipped).
pub fn resolve_pair(
    a: &Kinematics,
    b: &Kinematics,
    mass_a: f64,
    mass_b: f64,
) -> Option<(Kinematics, Kinematics)> {
    let delta = a.position - b.position;
    let distance = delta.length();

    if distance == 0.0 {
        log::warn!("coincident ball centers at {:?}, skipping pair", a.position);
        return None;
    }

    let min_distance = (a.diameter + b.diameter) / 2.0;
    if distance > min_distance {
        return None;
    }

    let normal = delta / distance;
    let vn_a = a.velocity.dot(normal);
    let vn_b = b.velocity.dot(normal);

    // Already separating along the normal: leave it alone, otherwise the
    // same contact would be re-resolved every cycle until the balls part
    if vn_a - vn_b >= 0.0 {
        return None;
    }

    let mass_sum = mass_a + mass_b;
    let vn_a_post = (vn_a * (mass_a - mass_b) + 2.0 * mass_b * vn_b) / mass_sum;
    let vn_b_post = (vn_b * (mass_b - mass_a) + 2.0 * mass_a * vn_a) / mass_sum;

    let mut out_a = *a;
    let mut out_b = *b;
    out_a.velocity = a.velocity + (vn_a_post - vn_a) * normal;
    out_b.velocity = b.velocity + (vn_b_post - vn_b) * normal;

    let overlap = min_distance - distance;
    if overlap > 0.0 {
        let correction = normal * (overlap / 2.0);
        out_a.position = a.position + correction;
        out_b.position = b.position - correction;
    }

    Some((out_a, out_b))
}

/// Fixed-rate collision cycle runner
///
/// Shares the ball registry and arena with the coordinator; the whole pass
/// (wall pass + index rebuild + pairwise resolution) runs under the global
/// simulation lock so cycles never overlap each other or an arena resize.
pub(crate) struct CollisionEngine {
    pub balls: Arc<RwLock<Vec<Arc<Ball>>>>,
    pub arena: Arc<RwLock<Arena>>,
    pub sim_lock: Arc<Mutex<()>>,
}

impl CollisionEngine {
    /// One full collision pass
    pub fn run_cycle(&self) {
        let _guard = self.sim_lock.lock().unwrap();

        let balls: Vec<Arc<Ball>> = self.balls.read().unwrap().clone();
        if balls.is_empty() {
            return;
        }
        let arena = *self.arena.read().unwrap();

        // Wall pass first, so the pairwise pass sees in-bounds positions
        for ball in &balls {
            if let Some(corrected) = bounce_off_walls(&ball.kinematics(), &arena) {
                ball.apply(corrected);
            }
        }

        // Rebuild the index from a consistent snapshot of positions
        let snapshots: Vec<(Arc<Ball>, Kinematics)> = balls
            .iter()
            .map(|b| (Arc::clone(b), b.kinematics()))
            .collect();
        let mut max_diameter: f64 = 0.0;
        let mut by_id = HashMap::with_capacity(balls.len());
        for (ball, kin) in &snapshots {
            max_diameter = max_diameter.max(kin.diameter);
            by_id.insert(ball.id(), Arc::clone(ball));
        }

        let mut tree = QuadTree::new(arena.bounds(), MAX_ITEMS_PER_NODE, 2.0 * max_diameter);
        for (ball, kin) in &snapshots {
            tree.insert(TreeItem {
                id: ball.id(),
                center: kin.position + DVec2::splat(kin.diameter / 2.0),
                radius: kin.diameter / 2.0,
            });
        }

        for (id_a, id_b) in tree.candidate_pairs() {
            let (Some(a), Some(b)) = (by_id.get(&id_a), by_id.get(&id_b)) else {
                continue;
            };
            // Re-read the latest state so resolutions on shared balls
            // compose within this cycle
            let kin_a = a.kinematics();
            let kin_b = b.kinematics();
            if let Some((new_a, new_b)) = resolve_pair(&kin_a, &kin_b, a.mass(), b.mass()) {
                a.apply(new_a);
                b.apply(new_b);
            }
        }
    }
}

/// Spawn the collision engine thread, cycling at the given interval until
/// `running` goes false
pub(crate) fn spawn_engine(
    engine: CollisionEngine,
    running: Arc<AtomicBool>,
    interval: Duration,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("collision-engine".into())
        .spawn(move || {
            log::debug!("collision engine started");
            while running.load(Ordering::Acquire) {
                engine.run_cycle();
                thread::sleep(interval);
            }
            log::debug!("collision engine stopped");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ball::BallId;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn kin(px: f64, py: f64, vx: f64, vy: f64) -> Kinematics {
        Kinematics {
            position: DVec2::new(px, py),
            velocity: DVec2::new(vx, vy),
            diameter: 10.0,
        }
    }

    #[test]
    fn test_wall_bounce_at_right_edge() {
        // Arena sized so the effective x bound sits exactly at 370
        let arena = Arena::new(384.0, 600.0, 2.0);
        assert_relative_eq!(arena.max_x(10.0), 370.0);

        let k = kin(370.0, 10.0, 10.0, 0.0);
        let bounced = bounce_off_walls(&k, &arena).expect("must reflect");
        assert_relative_eq!(bounced.velocity.x, -10.0);
        assert_relative_eq!(bounced.velocity.y, 0.0);
    }

    #[test]
    fn test_wall_handling_is_noop_inside_bounds() {
        let arena = Arena::new(800.0, 600.0, 4.0);
        let k = kin(200.0, 300.0, 50.0, -25.0);
        assert!(bounce_off_walls(&k, &arena).is_none());
    }

    #[test]
    fn test_wall_overshoot_is_clamped() {
        let arena = Arena::new(800.0, 600.0, 0.0);
        let k = kin(-5.0, 300.0, -40.0, 0.0);
        let bounced = bounce_off_walls(&k, &arena).expect("must reflect");
        assert_relative_eq!(bounced.position.x, 0.0);
        assert_relative_eq!(bounced.velocity.x, 40.0);
    }

    #[test]
    fn test_wall_does_not_reflect_inward_motion_at_bound() {
        // Resting on the right bound but already heading back inside:
        // velocity must not be flipped a second time
        let arena = Arena::new(384.0, 600.0, 2.0);
        let k = kin(370.0, 10.0, -10.0, 0.0);
        assert!(bounce_off_walls(&k, &arena).is_none());
    }

    #[test]
    fn test_equal_mass_head_on_swaps_velocities() {
        let a = kin(100.0, 100.0, 5.0, 0.0);
        let b = kin(105.0, 100.0, -5.0, 0.0);
        let (new_a, new_b) = resolve_pair(&a, &b, 1.0, 1.0).expect("must collide");

        assert_relative_eq!(new_a.velocity.x, -5.0);
        assert_relative_eq!(new_b.velocity.x, 5.0);
        assert_relative_eq!(new_a.velocity.y, 0.0);
        assert_relative_eq!(new_b.velocity.y, 0.0);

        // De-overlap pushed them back to contact distance
        let distance = (new_a.position - new_b.position).length();
        assert!(distance >= 10.0 - 1e-9, "still interpenetrating: {distance}");
    }

    #[test]
    fn test_separating_pair_is_skipped() {
        let a = kin(100.0, 100.0, -5.0, 0.0);
        let b = kin(105.0, 100.0, 5.0, 0.0);
        assert!(resolve_pair(&a, &b, 1.0, 1.0).is_none());
    }

    #[test]
    fn test_distant_pair_is_skipped() {
        let a = kin(100.0, 100.0, 5.0, 0.0);
        let b = kin(200.0, 100.0, -5.0, 0.0);
        assert!(resolve_pair(&a, &b, 1.0, 1.0).is_none());
    }

    #[test]
    fn test_coincident_centers_are_skipped() {
        let a = kin(100.0, 100.0, 5.0, 0.0);
        let b = kin(100.0, 100.0, -5.0, 0.0);
        assert!(resolve_pair(&a, &b, 1.0, 1.0).is_none());
    }

    #[test]
    fn test_tangential_component_is_preserved() {
        // Contact normal is along x; the y components must pass through
        let a = kin(100.0, 100.0, 5.0, 3.0);
        let b = kin(105.0, 100.0, -5.0, -7.0);
        let (new_a, new_b) = resolve_pair(&a, &b, 1.0, 1.0).expect("must collide");
        assert_relative_eq!(new_a.velocity.y, 3.0);
        assert_relative_eq!(new_b.velocity.y, -7.0);
    }

    #[test]
    fn test_heavy_ball_barely_deflects() {
        let a = kin(100.0, 100.0, 5.0, 0.0);
        let b = kin(105.0, 100.0, -5.0, 0.0);
        let (new_a, new_b) = resolve_pair(&a, &b, 100.0, 1.0).expect("must collide");
        // Heavy ball keeps most of its momentum, light one bounces away
        assert!(new_a.velocity.x > 4.0);
        assert!(new_b.velocity.x > 4.0);
    }

    #[test]
    fn test_engine_cycle_contains_and_resolves() {
        use crate::sim::ball::Ball;

        let arena = Arena::new(200.0, 200.0, 0.0);
        let a = Arc::new(
            Ball::new(BallId(1), DVec2::new(50.0, 50.0), DVec2::new(5.0, 0.0), 1.0, 10.0).unwrap(),
        );
        let b = Arc::new(
            Ball::new(BallId(2), DVec2::new(55.0, 50.0), DVec2::new(-5.0, 0.0), 1.0, 10.0).unwrap(),
        );
        // Out past the right bound, still heading out
        let c = Arc::new(
            Ball::new(BallId(3), DVec2::new(195.0, 100.0), DVec2::new(30.0, 0.0), 1.0, 10.0)
                .unwrap(),
        );

        let engine = CollisionEngine {
            balls: Arc::new(RwLock::new(vec![
                Arc::clone(&a),
                Arc::clone(&b),
                Arc::clone(&c),
            ])),
            arena: Arc::new(RwLock::new(arena)),
            sim_lock: Arc::new(Mutex::new(())),
        };
        engine.run_cycle();

        // Pair resolved: equal masses swap along the normal
        assert_relative_eq!(a.velocity().x, -5.0);
        assert_relative_eq!(b.velocity().x, 5.0);
        // Wall ball reflected and clamped
        assert!(c.velocity().x < 0.0);
        assert!(c.position().x <= arena.max_x(10.0));
    }

    proptest! {
        #[test]
        fn test_normal_kinetic_energy_is_conserved(
            gap in 0.1f64..9.9,
            va in -80.0f64..80.0,
            vb in -80.0f64..80.0,
            vy_a in -40.0f64..40.0,
            vy_b in -40.0f64..40.0,
            mass_a in 0.5f64..4.0,
            mass_b in 0.5f64..4.0,
        ) {
            let a = kin(100.0, 100.0, va, vy_a);
            let b = kin(100.0 + gap, 100.0, vb, vy_b);
            if let Some((new_a, new_b)) = resolve_pair(&a, &b, mass_a, mass_b) {
                let energy = |m: f64, v: DVec2| 0.5 * m * v.length_squared();
                let before = energy(mass_a, a.velocity) + energy(mass_b, b.velocity);
                let after = energy(mass_a, new_a.velocity) + energy(mass_b, new_b.velocity);
                prop_assert!((before - after).abs() < 1e-6 * before.max(1.0));

                // Momentum conserved too
                let p_before = mass_a * a.velocity + mass_b * b.velocity;
                let p_after = mass_a * new_a.velocity + mass_b * new_b.velocity;
                prop_assert!((p_before - p_after).length() < 1e-6);

                // No persistent interpenetration
                let distance = (new_a.position - new_b.position).length();
                prop_assert!(distance >= 10.0 - 1e-9);
            }
        }
    }
}
