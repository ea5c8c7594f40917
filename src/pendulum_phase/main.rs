// ------------------------------------------------------------
// Simple Pendulum: phase space + free-body diagram animation
// ------------------------------------------------------------
// Model:
//   d²θ/dt² = -(g/ℓ)·sin θ
//
// Method:
//   - Dormand–Prince 5(4) adaptive Runge–Kutta, rtol = 1e-9
//   - Dense output sampled onto a fixed 50 Hz time grid
//   - Each grid sample rendered as one animation frame:
//       left panel : phase-space trajectory (θ, ω) with state vector
//       right panel: pendulum scene with angle arc and force arrows
//   - Frames assembled into a looping GIF, 20 fps
//
// Outputs:
//   pendulum_phase_fbd_theta.gif                (current directory)
//   output/pendulum_phase/pendulum_log.csv
//   output/pendulum_phase/*.png                 (summary plots)
//
// Per-frame PNGs are staged under output/pendulum_phase/frames/ and
// the directory is removed once the GIF has been encoded.
// ------------------------------------------------------------

use anyhow::{Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use plotters::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

// ------------------------------------------------------------
// Physical and run constants
// ------------------------------------------------------------
const G: f64 = 9.81; // m/s²
const LENGTH: f64 = 0.9; // m

const THETA0_DEG: f64 = 39.64;
const OMEGA0: f64 = -1.17; // rad/s

const TMAX: f64 = 3.85; // s
const DT: f64 = 0.02; // s, fixed output grid spacing

const RTOL: f64 = 1e-9;
const ATOL: f64 = 1e-12;

const IMG_W: u32 = 1200;
const IMG_H: u32 = 600;
const PANEL_W: u32 = 600;

const FRAME_DELAY_MS: u32 = 50; // 20 fps
const GIF_NAME: &str = "pendulum_phase_fbd_theta.gif";

// ------------------------------------------------------------
// Pendulum dynamics
// ------------------------------------------------------------
#[derive(Clone, Copy)]
struct PendulumParams {
    g: f64,
    length: f64,
}

// State layout: y = [θ, ω].
fn pendulum_rhs(p: &PendulumParams, y: &[f64; 2]) -> [f64; 2] {
    [y[1], -(p.g / p.length) * y[0].sin()]
}

// Planar bob position for a given angle. Pivot at the origin, y up.
fn bob_position(p: &PendulumParams, theta: f64) -> (f64, f64) {
    (p.length * theta.sin(), -p.length * theta.cos())
}

// Total mechanical energy per unit mass, zero at the rest position.
fn mechanical_energy(p: &PendulumParams, theta: f64, omega: f64) -> f64 {
    0.5 * (p.length * omega).powi(2) + p.g * p.length * (1.0 - theta.cos())
}

// ------------------------------------------------------------
// Dormand–Prince 5(4) integrator with dense output
//
// Classical embedded error control (Hairer, Nørsett & Wanner). The
// solution is advanced with adaptive steps; the fixed output grid is
// filled by evaluating the quartic dense-output polynomial of each
// accepted step, so grid spacing never constrains the step size.
// ------------------------------------------------------------

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// Embedded 4th-order error weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// Dense-output weights.
const D1: f64 = -12715105075.0 / 11282082432.0;
const D3: f64 = 87487479700.0 / 32700410799.0;
const D4: f64 = -10690763975.0 / 1880347072.0;
const D5: f64 = 701980252875.0 / 199316789632.0;
const D6: f64 = -1453857185.0 / 822651844.0;
const D7: f64 = 69997945.0 / 29380423.0;

const SAFETY: f64 = 0.9;
const BETA: f64 = 0.04; // Lund stabilization
const UROUND: f64 = 2.3e-16;
const MAX_STEPS: usize = 100_000;

// Sampled solution on the fixed grid. Immutable once produced.
struct Trajectory {
    t: Vec<f64>,
    theta: Vec<f64>,
    omega: Vec<f64>,
}

// Initial step size guess: two-stage heuristic from Hairer et al.
fn initial_step(p: &PendulumParams, y: &[f64; 2], k1: &[f64; 2], h_max: f64, rtol: f64, atol: f64) -> f64 {
    let mut dnf = 0.0;
    let mut dny = 0.0;
    for i in 0..2 {
        let sk = atol + rtol * y[i].abs();
        dnf += (k1[i] / sk).powi(2);
        dny += (y[i] / sk).powi(2);
    }

    let mut h = if dnf <= 1e-10 || dny <= 1e-10 {
        1e-6
    } else {
        0.01 * (dny / dnf).sqrt()
    };
    h = h.min(h_max);

    // One explicit Euler step to estimate the second derivative.
    let mut y1 = [0.0; 2];
    for i in 0..2 {
        y1[i] = y[i] + h * k1[i];
    }
    let k2 = pendulum_rhs(p, &y1);

    let mut der2 = 0.0;
    for i in 0..2 {
        let sk = atol + rtol * y[i].abs();
        der2 += ((k2[i] - k1[i]) / sk).powi(2);
    }
    der2 = der2.sqrt() / h;

    let der12 = der2.max(dnf.sqrt());
    let h1 = if der12 <= 1e-15 {
        (h * 1e-3).max(1e-6)
    } else {
        (0.01 / der12).powf(0.2)
    };

    (100.0 * h).min(h1).min(h_max)
}

// Evaluate the dense-output polynomial of one accepted step at ti.
fn dense_eval(cont: &[[f64; 2]; 5], xold: f64, h: f64, ti: f64) -> [f64; 2] {
    let s = (ti - xold) / h;
    let s1 = 1.0 - s;
    let mut yi = [0.0; 2];
    for i in 0..2 {
        yi[i] = cont[0][i] + s * (cont[1][i] + s1 * (cont[2][i] + s * (cont[3][i] + s1 * cont[4][i])));
    }
    yi
}

// Integrate the pendulum from grid[0] to the last grid point, returning
// the state at every grid sample. Non-convergence aborts the run.
fn integrate_on_grid(
    p: &PendulumParams,
    y0: [f64; 2],
    grid: &[f64],
    rtol: f64,
    atol: f64,
) -> Result<Trajectory> {
    if grid.len() < 2 {
        anyhow::bail!("Time grid needs at least two samples.");
    }
    if grid.windows(2).any(|w| w[1] <= w[0]) {
        anyhow::bail!("Time grid must be strictly increasing.");
    }

    let tend = grid[grid.len() - 1];
    let mut x = grid[0];
    let mut y = y0;
    let mut k1 = pendulum_rhs(p, &y);

    let h_max = tend - x;
    let mut h = initial_step(p, &y, &k1, h_max, rtol, atol);

    let mut traj = Trajectory {
        t: Vec::with_capacity(grid.len()),
        theta: Vec::with_capacity(grid.len()),
        omega: Vec::with_capacity(grid.len()),
    };

    // First grid point coincides with the initial condition.
    traj.t.push(grid[0]);
    traj.theta.push(y[0]);
    traj.omega.push(y[1]);
    let mut next = 1;

    let expo1 = 0.2 - BETA * 0.75;
    let mut facold: f64 = 1e-4;
    let mut reject = false;
    let mut nsteps = 0usize;

    while next < grid.len() {
        if nsteps > MAX_STEPS {
            anyhow::bail!(
                "Integrator did not reach t = {} within {} steps.",
                tend,
                MAX_STEPS
            );
        }
        if 0.1 * h.abs() <= x.abs() * UROUND {
            anyhow::bail!("Integrator step size underflow at t = {}.", x);
        }

        // Land exactly on the final time.
        if x + 1.01 * h > tend {
            h = tend - x;
        }
        nsteps += 1;

        let mut y1 = [0.0; 2];

        for i in 0..2 {
            y1[i] = y[i] + h * A21 * k1[i];
        }
        let k2 = pendulum_rhs(p, &y1);

        for i in 0..2 {
            y1[i] = y[i] + h * (A31 * k1[i] + A32 * k2[i]);
        }
        let k3 = pendulum_rhs(p, &y1);

        for i in 0..2 {
            y1[i] = y[i] + h * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
        }
        let k4 = pendulum_rhs(p, &y1);

        for i in 0..2 {
            y1[i] = y[i] + h * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
        }
        let k5 = pendulum_rhs(p, &y1);

        for i in 0..2 {
            y1[i] =
                y[i] + h * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
        }
        let k6 = pendulum_rhs(p, &y1);

        // 5th-order solution, evaluated once more for the FSAL stage.
        for i in 0..2 {
            y1[i] =
                y[i] + h * (A71 * k1[i] + A73 * k3[i] + A74 * k4[i] + A75 * k5[i] + A76 * k6[i]);
        }
        let k7 = pendulum_rhs(p, &y1);

        // Embedded error estimate, scaled per component.
        let mut err = 0.0;
        for i in 0..2 {
            let e = h * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
            let sk = atol + rtol * y[i].abs().max(y1[i].abs());
            err += (e / sk).powi(2);
        }
        err = (err / 2.0).sqrt();

        let fac11 = err.powf(expo1);

        if err <= 1.0 {
            // Step accepted: build dense-output coefficients, then sample
            // every grid point that falls inside this step.
            let fac = (fac11 / facold.powf(BETA) / SAFETY).clamp(0.1, 5.0);
            facold = err.max(1e-4);

            let mut cont = [[0.0f64; 2]; 5];
            for i in 0..2 {
                let ydiff = y1[i] - y[i];
                let bspl = h * k1[i] - ydiff;
                cont[0][i] = y[i];
                cont[1][i] = ydiff;
                cont[2][i] = bspl;
                cont[3][i] = ydiff - h * k7[i] - bspl;
                cont[4][i] = h
                    * (D1 * k1[i] + D3 * k3[i] + D4 * k4[i] + D5 * k5[i] + D6 * k6[i] + D7 * k7[i]);
            }

            let xold = x;
            x += h;
            y = y1;
            k1 = k7;

            while next < grid.len() && grid[next] <= x + 1e-12 {
                let yi = dense_eval(&cont, xold, h, grid[next]);
                traj.t.push(grid[next]);
                traj.theta.push(yi[0]);
                traj.omega.push(yi[1]);
                next += 1;
            }

            let mut hnew = h / fac;
            if reject {
                hnew = hnew.min(h);
                reject = false;
            }
            h = hnew.min(h_max);
        } else {
            // Step rejected: shrink and retry.
            h /= (fac11 / SAFETY).min(5.0);
            reject = true;
        }
    }

    Ok(traj)
}

// Fixed output grid: t0, t0+dt, ... strictly below tmax.
fn time_grid(t0: f64, tmax: f64, dt: f64) -> Vec<f64> {
    let n = ((tmax - t0) / dt).ceil() as usize;
    (0..n).map(|k| t0 + k as f64 * dt).collect()
}

// ------------------------------------------------------------
// Frame rendering
//
// The chart panel and all text go through Plotters into an RGB buffer;
// the pendulum geometry (rod, bob, arc, force arrows) is then drawn on
// top with imageproc at pixel coordinates from the same mapping.
// ------------------------------------------------------------

struct PhaseLimits {
    th_lo: f64,
    th_hi: f64,
    om_lo: f64,
    om_hi: f64,
}

// Axis limits at 1.2× the extreme trajectory values.
fn phase_limits(traj: &Trajectory) -> PhaseLimits {
    let mut th_lo = f64::INFINITY;
    let mut th_hi = f64::NEG_INFINITY;
    let mut om_lo = f64::INFINITY;
    let mut om_hi = f64::NEG_INFINITY;
    for k in 0..traj.t.len() {
        th_lo = th_lo.min(traj.theta[k]);
        th_hi = th_hi.max(traj.theta[k]);
        om_lo = om_lo.min(traj.omega[k]);
        om_hi = om_hi.max(traj.omega[k]);
    }
    PhaseLimits {
        th_lo: 1.2 * th_lo,
        th_hi: 1.2 * th_hi,
        om_lo: 1.2 * om_lo,
        om_hi: 1.2 * om_hi,
    }
}

fn rgba(r: u8, g: u8, b: u8) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

// Line segment rendered as parallel offsets along its normal so the rod
// keeps a constant width at every angle.
fn draw_thick_segment(
    img: &mut RgbaImage,
    start: (f32, f32),
    end: (f32, f32),
    thickness: i32,
    color: Rgba<u8>,
) {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-3 {
        return;
    }
    let nx = -dy / len;
    let ny = dx / len;

    let half = thickness.max(1) / 2;
    for k in -half..=half {
        let off = k as f32;
        draw_line_segment_mut(
            img,
            (start.0 + nx * off, start.1 + ny * off),
            (end.0 + nx * off, end.1 + ny * off),
            color,
        );
    }
}

// Force arrow: shaft plus a filled triangular head at `end`.
fn draw_force_arrow(img: &mut RgbaImage, start: (f32, f32), end: (f32, f32), color: Rgba<u8>) {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-3 {
        return;
    }
    let ux = dx / len;
    let uy = dy / len;
    let nx = -uy;
    let ny = ux;

    draw_thick_segment(img, start, end, 3, color);

    let head_len = 10.0f32;
    let head_w = 5.0f32;
    let base = (end.0 - ux * head_len, end.1 - uy * head_len);
    let head = [
        Point::new(end.0 as i32, end.1 as i32),
        Point::new((base.0 + nx * head_w) as i32, (base.1 + ny * head_w) as i32),
        Point::new((base.0 - nx * head_w) as i32, (base.1 - ny * head_w) as i32),
    ];
    draw_polygon_mut(img, &head, color);
}

fn rgb_buffer_to_rgba(buf: &[u8], w: u32, h: u32) -> RgbaImage {
    let mut out = RgbaImage::new(w, h);
    for (dst, src) in out.pixels_mut().zip(buf.chunks_exact(3)) {
        *dst = Rgba([src[0], src[1], src[2], 255]);
    }
    out
}

// Render the frame for grid sample `i`.
fn render_frame(
    p: &PendulumParams,
    traj: &Trajectory,
    lim: &PhaseLimits,
    i: usize,
) -> Result<RgbaImage> {
    let theta_i = traj.theta[i];
    let omega_i = traj.omega[i];
    let (xb, yb) = bob_position(p, theta_i);

    // Scene mapping: pivot near the top of the right panel, y up.
    let scale = PANEL_W as f64 / (2.4 * p.length);
    let pivot_px = (PANEL_W as f64 * 1.5, 0.5 * p.length * scale);
    let to_px = |x: f64, y: f64| -> (f32, f32) {
        ((pivot_px.0 + x * scale) as f32, (pivot_px.1 - y * scale) as f32)
    };

    // Force arrows: gravity straight down, tension toward the pivot,
    // both at a fixed visual length.
    let s_arrow = 0.18 * p.length;
    let ex = theta_i.sin();
    let ey = -theta_i.cos();
    let bob_px = to_px(xb, yb);
    let grav_tip = to_px(xb, yb - s_arrow);
    let tens_tip = to_px(xb - s_arrow * ex, yb - s_arrow * ey);

    let mut buf = vec![255u8; (IMG_W * IMG_H * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (IMG_W, IMG_H)).into_drawing_area();
        root.fill(&WHITE)?;
        let (phase, scene) = root.split_horizontally(PANEL_W as i32);

        let mut chart = ChartBuilder::on(&phase)
            .margin(12)
            .caption("Phase space", ("sans-serif", 30))
            .x_label_area_size(55)
            .y_label_area_size(70)
            .build_cartesian_2d(lim.th_lo..lim.th_hi, lim.om_lo..lim.om_hi)?;

        chart
            .configure_mesh()
            .x_desc("θ (rad)")
            .y_desc("ω (rad/s)")
            .axis_desc_style(("sans-serif", 24))
            .label_style(("sans-serif", 18))
            .x_labels(8)
            .y_labels(8)
            .x_label_formatter(&|v| format!("{:.2}", v))
            .y_label_formatter(&|v| format!("{:.2}", v))
            .draw()?;

        // Trajectory swept so far, then the current state vector.
        chart.draw_series(LineSeries::new(
            traj.theta[..=i]
                .iter()
                .zip(traj.omega[..=i].iter())
                .map(|(&a, &b)| (a, b)),
            RGBColor(31, 119, 180).stroke_width(2),
        ))?;
        chart.draw_series(LineSeries::new(
            [(0.0, 0.0), (theta_i, omega_i)],
            RGBColor(255, 140, 0).stroke_width(3),
        ))?;

        // Scene text layer (coordinates relative to the right panel).
        let panel_x = |px: f32| px as i32 - PANEL_W as i32;
        let eq_font = ("sans-serif", 22).into_font().color(&BLACK);
        scene.draw(&Text::new(
            "d²θ/dt² = -(g/ℓ)·sin θ".to_string(),
            (24, 18),
            eq_font.clone(),
        ))?;
        scene.draw(&Text::new("ω = dθ/dt".to_string(), (24, 44), eq_font))?;
        scene.draw(&Text::new(
            format!(
                "θ = {:.3} rad ({:.2}°), ω = {:.2} rad/s",
                theta_i,
                theta_i.to_degrees(),
                omega_i
            ),
            (24, 86),
            ("sans-serif", 18).into_font().color(&BLACK),
        ))?;

        // Angle label at the arc midpoint, force labels at the arrow tips.
        let r_label = 0.32 * p.length;
        let am = 0.5 * theta_i;
        let label_px = to_px(r_label * am.sin(), -r_label * am.cos());
        scene.draw(&Text::new(
            "θ".to_string(),
            (panel_x(label_px.0), label_px.1 as i32 - 8),
            ("sans-serif", 20).into_font().color(&RGBColor(40, 140, 60)),
        ))?;
        scene.draw(&Text::new(
            "mg".to_string(),
            (panel_x(grav_tip.0) + 8, grav_tip.1 as i32),
            ("sans-serif", 18).into_font().color(&RGBColor(40, 90, 200)),
        ))?;
        scene.draw(&Text::new(
            "T".to_string(),
            (panel_x(tens_tip.0) - 18, tens_tip.1 as i32 - 10),
            ("sans-serif", 18).into_font().color(&RGBColor(200, 50, 50)),
        ))?;

        root.present()?;
    }

    // Geometry pass on top of the text layer.
    let mut frame = rgb_buffer_to_rgba(&buf, IMG_W, IMG_H);

    let rod_color = rgba(60, 60, 70);
    let bob_color = rgba(31, 119, 180);
    let arc_color = rgba(40, 140, 60);
    let grav_color = rgba(40, 90, 200);
    let tens_color = rgba(200, 50, 50);

    // Angle arc from the vertical to the current angle.
    let r_arc = 0.25 * p.length;
    let arc: Vec<(f32, f32)> = (0..=48)
        .map(|k| {
            let a = theta_i * k as f64 / 48.0;
            to_px(r_arc * a.sin(), -r_arc * a.cos())
        })
        .collect();
    for seg in arc.windows(2) {
        draw_line_segment_mut(&mut frame, seg[0], seg[1], arc_color);
    }

    let pivot = (pivot_px.0 as f32, pivot_px.1 as f32);
    draw_thick_segment(&mut frame, pivot, bob_px, 5, rod_color);
    draw_filled_circle_mut(&mut frame, (pivot.0 as i32, pivot.1 as i32), 4, rod_color);
    draw_filled_circle_mut(
        &mut frame,
        (bob_px.0.round() as i32, bob_px.1.round() as i32),
        11,
        bob_color,
    );

    draw_force_arrow(&mut frame, bob_px, grav_tip, grav_color);
    draw_force_arrow(&mut frame, bob_px, tens_tip, tens_color);

    Ok(frame)
}

// ------------------------------------------------------------
// GIF assembly
// ------------------------------------------------------------
fn assemble_gif(frames_dir: &Path, frame_count: usize, delay_ms: u32, out_path: &Path) -> Result<()> {
    let produced = fs::read_dir(frames_dir)
        .context("Failed to list frames directory")?
        .count();
    if produced != frame_count {
        anyhow::bail!("Expected {} frames, found {}.", frame_count, produced);
    }

    let file = File::create(out_path)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;
    let mut encoder = GifEncoder::new_with_speed(file, 10);
    encoder.set_repeat(Repeat::Infinite)?;

    for i in 0..frame_count {
        let name = frames_dir.join(format!("frame_{:04}.png", i));
        let img = image::open(&name)
            .with_context(|| format!("Failed to read {}", name.display()))?
            .to_rgba8();
        encoder.encode_frame(Frame::from_parts(
            img,
            0,
            0,
            Delay::from_numer_denom_ms(delay_ms, 1),
        ))?;
    }
    Ok(())
}

// ------------------------------------------------------------
// CSV log
// ------------------------------------------------------------
fn write_csv(filename: &Path, header: &[&str], cols: &[&[f64]]) -> Result<()> {
    if cols.is_empty() || cols.iter().any(|c| c.len() != cols[0].len()) {
        anyhow::bail!("CSV: column sizes do not match.");
    }

    let mut wtr = csv::Writer::from_path(filename)
        .with_context(|| format!("CSV: cannot open {}", filename.display()))?;
    wtr.write_record(header)?;
    for r in 0..cols[0].len() {
        wtr.write_record(cols.iter().map(|c| c[r].to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

// ------------------------------------------------------------
// Summary plots (Plotters)
// ------------------------------------------------------------
fn save_line_plot_png(
    filename: &Path,
    title: &str,
    xlabel: &str,
    ylabel: &str,
    x: &[f64],
    y: &[f64],
    color: RGBColor,
) -> Result<()> {
    if x.len() != y.len() {
        anyhow::bail!("Plot error: x and y must have the same length.");
    }

    let (w, h) = (1600u32, 1200u32);

    let mut xmin = f64::INFINITY;
    let mut xmax = f64::NEG_INFINITY;
    let mut ymin = f64::INFINITY;
    let mut ymax = f64::NEG_INFINITY;
    for k in 0..x.len() {
        xmin = xmin.min(x[k]);
        xmax = xmax.max(x[k]);
        ymin = ymin.min(y[k]);
        ymax = ymax.max(y[k]);
    }
    let ypad = 0.05 * (ymax - ymin).abs().max(1e-9);
    ymin -= ypad;
    ymax += ypad;

    let root = BitMapBackend::new(filename, (w, h)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(title, ("sans-serif", 52))
        .x_label_area_size(90)
        .y_label_area_size(110)
        .build_cartesian_2d(xmin..xmax, ymin..ymax)?;

    chart
        .configure_mesh()
        .x_desc(xlabel)
        .y_desc(ylabel)
        .axis_desc_style(("sans-serif", 40))
        .label_style(("sans-serif", 30))
        .x_labels(10)
        .y_labels(10)
        .x_label_formatter(&|v| format!("{:.2}", v))
        .y_label_formatter(&|v| format!("{:.2}", v))
        .bold_line_style(RGBColor(170, 170, 170).stroke_width(2))
        .light_line_style(RGBColor(225, 225, 225).stroke_width(1))
        .draw()?;

    chart.draw_series(LineSeries::new(
        x.iter().copied().zip(y.iter().copied()),
        color.stroke_width(3),
    ))?;

    root.present()?;
    Ok(())
}

fn main() -> Result<()> {
    // ----------------------------
    // Output folders
    // ----------------------------
    let out_dir = PathBuf::from("output").join("pendulum_phase");
    let frames_dir = out_dir.join("frames");
    fs::create_dir_all(&frames_dir).context("Failed to create output directories")?;

    // Clean stale frames from an interrupted run.
    for entry in fs::read_dir(&frames_dir)? {
        let path = entry?.path();
        if path.is_file() {
            let _ = fs::remove_file(path);
        }
    }

    // ----------------------------
    // Integrate
    // ----------------------------
    let p = PendulumParams { g: G, length: LENGTH };
    let grid = time_grid(0.0, TMAX, DT);
    println!(
        "Integrating pendulum: {} samples, dt = {}, rtol = {:e}",
        grid.len(),
        DT,
        RTOL
    );

    let y0 = [THETA0_DEG.to_radians(), OMEGA0];
    let traj = integrate_on_grid(&p, y0, &grid, RTOL, ATOL)?;
    let lim = phase_limits(&traj);

    // ----------------------------
    // Render frames in grid order
    // ----------------------------
    let nframes = traj.t.len();
    for i in 0..nframes {
        let frame = render_frame(&p, &traj, &lim, i)?;
        let name = frames_dir.join(format!("frame_{:04}.png", i));
        frame
            .save(&name)
            .with_context(|| format!("Failed to save {}", name.display()))?;

        if i % 50 == 0 {
            println!(
                "Frame {}/{}  t={:.2}  θ={:+.3}  ω={:+.3}",
                i, nframes, traj.t[i], traj.theta[i], traj.omega[i]
            );
        }
    }

    // ----------------------------
    // Assemble GIF, then drop the staging frames
    // ----------------------------
    println!("Encoding GIF...");
    assemble_gif(&frames_dir, nframes, FRAME_DELAY_MS, Path::new(GIF_NAME))?;
    fs::remove_dir_all(&frames_dir).context("Failed to remove frames directory")?;

    // ----------------------------
    // Summary plots + CSV log
    // ----------------------------
    println!("Saving plots and CSV...");
    let energy: Vec<f64> = traj
        .theta
        .iter()
        .zip(traj.omega.iter())
        .map(|(&th, &om)| mechanical_energy(&p, th, om))
        .collect();
    let e0 = energy[0];
    let energy_drift: Vec<f64> = energy.iter().map(|&e| (e - e0) / e0).collect();

    save_line_plot_png(
        &out_dir.join("theta_vs_time.png"),
        "Pendulum Angle θ(t)",
        "time (s)",
        "θ (rad)",
        &traj.t,
        &traj.theta,
        RGBColor(31, 119, 180),
    )?;
    save_line_plot_png(
        &out_dir.join("omega_vs_time.png"),
        "Angular Velocity ω(t)",
        "time (s)",
        "ω (rad/s)",
        &traj.t,
        &traj.omega,
        RGBColor(255, 140, 0),
    )?;
    save_line_plot_png(
        &out_dir.join("energy_drift.png"),
        "Relative Mechanical Energy Error",
        "time (s)",
        "(E - E0) / E0",
        &traj.t,
        &energy_drift,
        RGBColor(200, 50, 50),
    )?;
    save_line_plot_png(
        &out_dir.join("phase_portrait.png"),
        "Phase Portrait",
        "θ (rad)",
        "ω (rad/s)",
        &traj.theta,
        &traj.omega,
        RGBColor(31, 119, 180),
    )?;

    write_csv(
        &out_dir.join("pendulum_log.csv"),
        &["t", "theta", "omega", "energy"],
        &[&traj.t[..], &traj.theta[..], &traj.omega[..], &energy[..]],
    )?;

    println!(
        "Done. Animation: {}  Plots and log: {}",
        GIF_NAME,
        out_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn params() -> PendulumParams {
        PendulumParams { g: G, length: LENGTH }
    }

    fn production_trajectory() -> Trajectory {
        let grid = time_grid(0.0, TMAX, DT);
        integrate_on_grid(&params(), [THETA0_DEG.to_radians(), OMEGA0], &grid, RTOL, ATOL)
            .expect("integration failed")
    }

    #[test]
    fn small_angle_matches_harmonic_solution() {
        // For θ0 → 0 the pendulum is simple harmonic: θ(t) = θ0·cos(w t).
        let p = params();
        let theta0 = 1e-4;
        let w = (p.g / p.length).sqrt();
        let grid = time_grid(0.0, 2.0, 0.01);
        let traj = integrate_on_grid(&p, [theta0, 0.0], &grid, 1e-9, 1e-14).unwrap();

        for k in 0..grid.len() {
            let expected = theta0 * (w * grid[k]).cos();
            assert_abs_diff_eq!(traj.theta[k], expected, epsilon = 1e-10);
        }
    }

    #[test]
    fn energy_stays_in_tolerance_band() {
        let p = params();
        let traj = production_trajectory();
        let e0 = mechanical_energy(&p, traj.theta[0], traj.omega[0]);
        for k in 0..traj.t.len() {
            let e = mechanical_energy(&p, traj.theta[k], traj.omega[k]);
            assert!(
                ((e - e0) / e0).abs() < 1e-7,
                "energy drift {} at t = {}",
                (e - e0) / e0,
                traj.t[k]
            );
        }
    }

    #[test]
    fn grid_sampling_is_exact_and_ordered() {
        let grid = time_grid(0.0, TMAX, DT);
        assert_eq!(grid.len(), 193);

        let traj = production_trajectory();
        assert_eq!(traj.t, grid);
        assert_eq!(traj.theta.len(), grid.len());
        assert_eq!(traj.omega.len(), grid.len());
        assert!(traj.t.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn integration_is_deterministic() {
        let a = production_trajectory();
        let b = production_trajectory();
        assert_eq!(a.theta, b.theta);
        assert_eq!(a.omega, b.omega);
    }

    #[test]
    fn bob_stays_on_rod_circle() {
        let p = params();
        for k in -20..=20 {
            let theta = 0.15 * k as f64;
            let (x, y) = bob_position(&p, theta);
            assert_abs_diff_eq!(x * x + y * y, p.length * p.length, epsilon = 1e-12);
        }
    }

    #[test]
    fn rejects_malformed_grid() {
        let p = params();
        assert!(integrate_on_grid(&p, [0.1, 0.0], &[], RTOL, ATOL).is_err());
        assert!(integrate_on_grid(&p, [0.1, 0.0], &[0.0], RTOL, ATOL).is_err());
        assert!(integrate_on_grid(&p, [0.1, 0.0], &[0.0, 0.2, 0.1], RTOL, ATOL).is_err());
    }

    #[test]
    fn frames_render_and_assemble() {
        let p = params();
        let grid = time_grid(0.0, 0.1, 0.02);
        let traj = integrate_on_grid(&p, [THETA0_DEG.to_radians(), OMEGA0], &grid, RTOL, ATOL)
            .unwrap();
        let lim = phase_limits(&traj);

        let dir = tempfile::tempdir().unwrap();
        for i in 0..traj.t.len() {
            let frame = render_frame(&p, &traj, &lim, i).unwrap();
            assert_eq!(frame.dimensions(), (IMG_W, IMG_H));
            frame
                .save(dir.path().join(format!("frame_{:04}.png", i)))
                .unwrap();
        }

        let gif = dir.path().join("out.gif");
        assemble_gif(dir.path(), traj.t.len(), FRAME_DELAY_MS, &gif).unwrap();
        assert!(fs::metadata(&gif).unwrap().len() > 0);
    }
}
