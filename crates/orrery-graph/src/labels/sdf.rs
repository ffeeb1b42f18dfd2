//! Signed distance fields via the Felzenszwalb–Huttenlocher squared
//! Euclidean distance transform, one 1-D pass per axis.

/// Stand-in for infinity; keeps the parabola intersections finite.
const FAR: f32 = 1e20;

/// Scratch buffers reused across rows and columns.
struct Edt {
    f: Vec<f32>,
    d: Vec<f32>,
    v: Vec<usize>,
    z: Vec<f32>,
}

impl Edt {
    fn new(len: usize) -> Self {
        Self {
            f: vec![0.0; len],
            d: vec![0.0; len],
            v: vec![0; len],
            z: vec![0.0; len + 1],
        }
    }

    /// Lower envelope of parabolas rooted at `f[0..n]`.
    fn run(&mut self, n: usize) {
        let (f, d, v, z) = (&self.f, &mut self.d, &mut self.v, &mut self.z);
        v[0] = 0;
        z[0] = -FAR;
        z[1] = FAR;

        let mut k = 0usize;
        for q in 1..n {
            let qf = q as f32;
            let mut s;
            loop {
                let r = v[k];
                let rf = r as f32;
                s = (f[q] - f[r] + qf * qf - rf * rf) / (2.0 * (qf - rf));
                if s > z[k] {
                    k += 1;
                    break;
                }
                if k == 0 {
                    break;
                }
                k -= 1;
            }
            v[k] = q;
            z[k] = s;
            z[k + 1] = FAR;
        }

        k = 0;
        for (q, out) in d.iter_mut().enumerate().take(n) {
            let qf = q as f32;
            while z[k + 1] < qf {
                k += 1;
            }
            let r = v[k];
            let dq = qf - r as f32;
            *out = f[r] + dq * dq;
        }
    }
}

/// 2-D squared distance transform in place.
fn transform(grid: &mut [f32], width: usize, height: usize) {
    let mut edt = Edt::new(width.max(height));
    for x in 0..width {
        for y in 0..height {
            edt.f[y] = grid[y * width + x];
        }
        edt.run(height);
        for y in 0..height {
            grid[y * width + x] = edt.d[y];
        }
    }
    for y in 0..height {
        let row = &mut grid[y * width..(y + 1) * width];
        edt.f[..width].copy_from_slice(row);
        edt.run(width);
        row.copy_from_slice(&edt.d[..width]);
    }
}

/// Distance field of a coverage bitmap, normalized so 0.5 lies on the edge.
///
/// Inside tends to 1, outside to 0; `radius` (pixels) is the distance over
/// which the field ramps from edge to either extreme.
pub fn distance_field(coverage: &[u8], width: usize, height: usize, radius: f32) -> Vec<f32> {
    let len = width * height;
    let mut outer = vec![0.0f32; len];
    let mut inner = vec![0.0f32; len];
    for (i, &c) in coverage.iter().enumerate().take(len) {
        let a = c as f32 / 255.0;
        (outer[i], inner[i]) = match c {
            255 => (0.0, FAR),
            0 => (FAR, 0.0),
            _ => ((0.5 - a).max(0.0).powi(2), (a - 0.5).max(0.0).powi(2)),
        };
    }
    if len > 0 {
        transform(&mut outer, width, height);
        transform(&mut inner, width, height);
    }

    let radius = radius.max(f32::EPSILON);
    outer
        .iter()
        .zip(&inner)
        .map(|(&o, &i)| {
            let d = o.sqrt() - i.sqrt();
            (0.5 - d / (2.0 * radius)).clamp(0.0, 1.0)
        })
        .collect()
}

/// [`distance_field`] quantized to bytes.
pub fn distance_field_u8(coverage: &[u8], width: usize, height: usize, radius: f32) -> Vec<u8> {
    distance_field(coverage, width, height, radius)
        .into_iter()
        .map(|v| (v * 255.0).round() as u8)
        .collect()
}
