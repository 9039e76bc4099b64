use std::ops::{Add, Mul, Sub};

/// Legendre polynomial `P_n` and its first two derivatives at `t`
pub fn legendre(n: usize, t: f64) -> [f64; 3] {
    // [P, P', P''] of orders n-1 and n
    let mut prev = [1.0, 0.0, 0.0];
    if n == 0 {
        return prev;
    }
    let mut curr = [t, 1.0, 0.0];

    for k in 1..n {
        let k_ = k as f64;
        let next = [
            ((2.0 * k_ + 1.0) * t * curr[0] - k_ * prev[0]) / (k_ + 1.0),
            ((2.0 * k_ + 1.0) * (curr[0] + t * curr[1]) - k_ * prev[1]) / (k_ + 1.0),
            ((2.0 * k_ + 1.0) * (2.0 * curr[1] + t * curr[2]) - k_ * prev[2]) / (k_ + 1.0),
        ];
        prev = curr;
        curr = next;
    }

    curr
}

/// Lobatto shape function `l_n` and its derivative at `t`
///
/// `l_0 = (1 - t) / 2`, `l_1 = (1 + t) / 2` and `l_n = (P_n - P_{n-2}) / sqrt(2(2n - 1))` for `n >= 2`.
/// The higher order functions vanish at both ends of `[-1, 1]`.
pub fn lobatto(n: usize, t: f64) -> [f64; 2] {
    match n {
        0 => [(1.0 - t) / 2.0, -0.5],
        1 => [(1.0 + t) / 2.0, 0.5],
        _ => {
            let p_n = legendre(n, t);
            let p_n2 = legendre(n - 2, t);
            let n_ = n as f64;
            [
                (p_n[0] - p_n2[0]) / (2.0 * (2.0 * n_ - 1.0)).sqrt(),
                ((2.0 * n_ - 1.0) / 2.0).sqrt() * legendre(n - 1, t)[0],
            ]
        }
    }
}

/// Lobatto kernel `k_n(t) = l_n(t) / (l_0(t) l_1(t))` for `n >= 2`, with its derivative
///
/// Written in terms of `P'_{n-1}`, so it's well defined at `t = ±1`.
pub fn lobatto_kernel(n: usize, t: f64) -> [f64; 2] {
    assert!(n >= 2, "Lobatto kernels are only defined for n >= 2 (got {})!", n);
    let n_ = n as f64;
    let scale = -4.0 * (2.0 * n_ - 1.0) / (n_ * (n_ - 1.0) * (2.0 * (2.0 * n_ - 1.0)).sqrt());
    let p = legendre(n - 1, t);
    [scale * p[1], scale * p[2]]
}

/// A value sampled on the reference domain along with its partial derivatives
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sampled {
    pub val: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Sampled {
    pub const ZERO: Self = Self {
        val: 0.0,
        dx: 0.0,
        dy: 0.0,
    };

    pub const fn new(val: f64, dx: f64, dy: f64) -> Self {
        Self { val, dx, dy }
    }

    pub const fn constant(val: f64) -> Self {
        Self::new(val, 0.0, 0.0)
    }

    /// Compose a 1D function (value and derivative) with an affine coordinate `t(x, y)`
    pub fn compose([f, df]: [f64; 2], t: &Self) -> Self {
        Self::new(f, df * t.dx, df * t.dy)
    }
}

impl Add for Sampled {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.val + other.val, self.dx + other.dx, self.dy + other.dy)
    }
}

impl Sub for Sampled {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self::new(self.val - other.val, self.dx - other.dx, self.dy - other.dy)
    }
}

impl Mul for Sampled {
    type Output = Self;
    fn mul(self, other: Self) -> Self {
        Self::new(
            self.val * other.val,
            self.dx * other.val + self.val * other.dx,
            self.dy * other.val + self.val * other.dy,
        )
    }
}

impl Mul<f64> for Sampled {
    type Output = Self;
    fn mul(self, coefficient: f64) -> Self {
        Self::new(self.val * coefficient, self.dx * coefficient, self.dy * coefficient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLY_ACCURACY: f64 = 1e-12;
    const TEST_POINTS: [f64; 5] = [-1.0, -0.35, 0.0, 0.6, 1.0];

    #[test]
    fn legendre_closed_forms() {
        for t in TEST_POINTS {
            let p3 = legendre(3, t);
            assert!((p3[0] - (5.0 * t.powi(3) - 3.0 * t) / 2.0).abs() < POLY_ACCURACY);
            assert!((p3[1] - (15.0 * t.powi(2) - 3.0) / 2.0).abs() < POLY_ACCURACY);
            assert!((p3[2] - 15.0 * t).abs() < POLY_ACCURACY);
        }
        assert!((legendre(7, 1.0)[0] - 1.0).abs() < POLY_ACCURACY);
        assert!((legendre(7, -1.0)[0] + 1.0).abs() < POLY_ACCURACY);
    }

    #[test]
    fn lobatto_vanishes_at_ends() {
        for n in 2..12 {
            assert!(lobatto(n, -1.0)[0].abs() < POLY_ACCURACY);
            assert!(lobatto(n, 1.0)[0].abs() < POLY_ACCURACY);
        }
    }

    #[test]
    fn lobatto_derivatives() {
        let h = 1e-6;
        for n in 0..10 {
            for t in [-0.8, -0.1, 0.45, 0.9] {
                let fd = (lobatto(n, t + h)[0] - lobatto(n, t - h)[0]) / (2.0 * h);
                assert!((lobatto(n, t)[1] - fd).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn kernel_reproduces_lobatto() {
        for n in 2..10 {
            for t in TEST_POINTS {
                let l0l1 = lobatto(0, t)[0] * lobatto(1, t)[0];
                assert!((lobatto_kernel(n, t)[0] * l0l1 - lobatto(n, t)[0]).abs() < POLY_ACCURACY);
            }
        }
    }

    #[test]
    fn sampled_product_rule() {
        let x = Sampled::new(0.3, 1.0, 0.0);
        let y = Sampled::new(-0.2, 0.0, 1.0);
        let xy2 = x * y * y;

        assert!((xy2.val - 0.3 * 0.04).abs() < POLY_ACCURACY);
        assert!((xy2.dx - 0.04).abs() < POLY_ACCURACY);
        assert!((xy2.dy - 2.0 * 0.3 * -0.2).abs() < POLY_ACCURACY);
    }
}
