use crate::params::WorldParams;
use crate::particle::{lock_pair, Particle};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Contact {
    Apart,
    Degenerate,
    Stale,
    Separating,
    Resting,
    Impulse(f64),
}

/// Reads effective velocities, writes base velocities.
pub fn resolve(a: &Particle, b: &Particle, params: &WorldParams) -> Contact {
    let (mut ma, mut mb) = lock_pair(a, b);
    if a.is_deleted() || b.is_deleted() {
        return Contact::Stale;
    }

    let delta = mb.position - ma.position;
    let dist_sq = delta.length_sq();
    let reach = a.radius() + b.radius();
    if dist_sq > reach * reach {
        return Contact::Apart;
    }
    if dist_sq == 0.0 {
        return Contact::Degenerate;
    }
    let normal = delta * (1.0 / dist_sq.sqrt());

    let relative = (mb.velocity + b.forces()) - (ma.velocity + a.forces());
    let along_normal = relative.dot(normal);
    if along_normal >= 0.0 {
        return Contact::Separating;
    }

    let speed = -along_normal;
    let threshold = params.rest_speed_threshold;
    if speed < threshold {
        let push = params.rest_repulsion * (1.0 - speed / threshold);
        a.add_force(-normal * push);
        b.add_force(normal * push);
        return Contact::Resting;
    }

    let inv_a = 1.0 / a.mass();
    let inv_b = 1.0 / b.mass();
    let inv_sum = inv_a + inv_b;

    let restitution = a.restitution().min(b.restitution());
    let j = -(1.0 + restitution) * along_normal / inv_sum;
    ma.velocity -= normal * (j * inv_a);
    mb.velocity += normal * (j * inv_b);

    let tangent = normal.perp();
    let along_tangent = relative.dot(tangent);
    let mu = a.friction().min(b.friction());
    let jt = -mu * along_tangent / inv_sum;
    ma.velocity -= tangent * (jt * inv_a);
    mb.velocity += tangent * (jt * inv_b);

    Contact::Impulse(j)
}
