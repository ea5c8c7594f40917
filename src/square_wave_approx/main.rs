// ------------------------------------------------------------
// Square Wave Approximation: Fourier vs Sigma (Fejér) series
// ------------------------------------------------------------
// Signal:
//   square(t) = sign(sin t)
//
// Approximations, odd harmonics k = 1, 3, ..., N:
//   Fourier partial sum : Σ (4/π)(1/k)·sin(k·t)
//   Sigma approximation : same terms scaled by 1 - k/(N+1)
//
// One frame per truncation order N = 1, 3, ..., 79. The Fourier sum
// keeps its overshoot near the jumps (Gibbs phenomenon); the Fejér
// weighting suppresses it. Frames are assembled into a looping GIF.
//
// Outputs:
//   square_wave_approximation.gif               (current directory)
//   output/square_wave_approx/overshoot_log.csv
//   output/square_wave_approx/overshoot_vs_order.png
//
// Per-frame PNGs are staged under output/square_wave_approx/frames/
// and the directory is removed once the GIF has been encoded.
// ------------------------------------------------------------

use anyhow::{Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, Rgba, RgbaImage};
use plotters::prelude::*;
use std::f64::consts::PI;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

// ------------------------------------------------------------
// Run constants
// ------------------------------------------------------------
const SAMPLES: usize = 2000; // grid points over one period
const STEPS: usize = 40; // animation frames

const IMG_W: u32 = 960;
const IMG_H: u32 = 640;

const FRAME_DELAY_MS: u32 = 200;
const GIF_NAME: &str = "square_wave_approximation.gif";

const SQUARE_COLOR: RGBColor = RGBColor(214, 39, 40);
const FOURIER_COLOR: RGBColor = RGBColor(31, 119, 180);
const SIGMA_COLOR: RGBColor = RGBColor(44, 160, 44);

// ------------------------------------------------------------
// Signal synthesis
// ------------------------------------------------------------
fn square_wave(t: f64) -> f64 {
    t.sin().signum()
}

// Truncated Fourier series of the unit square wave, harmonics
// accumulated in ascending k. Even N collapses to the odd order below.
fn fourier_partial_sum(t: f64, n: u32) -> f64 {
    let mut acc = 0.0;
    let mut k = 1u32;
    while k <= n {
        acc += (4.0 / PI) * (k as f64 * t).sin() / k as f64;
        k += 2;
    }
    acc
}

// Same sum with Fejér kernel weighting 1 - k/(N+1), the "sigma
// approximation" that suppresses the Gibbs overshoot.
fn sigma_partial_sum(t: f64, n: u32) -> f64 {
    let mut acc = 0.0;
    let mut k = 1u32;
    while k <= n {
        let weight = 1.0 - k as f64 / (n as f64 + 1.0);
        acc += weight * (4.0 / PI) * (k as f64 * t).sin() / k as f64;
        k += 2;
    }
    acc
}

// Evenly spaced grid over [0, 2π], endpoints included.
fn sample_grid(n: usize) -> Vec<f64> {
    (0..n)
        .map(|k| 2.0 * PI * k as f64 / (n - 1) as f64)
        .collect()
}

// Truncation order for 1-based frame index i: 1, 3, 5, ...
fn frame_orders() -> Vec<u32> {
    (1..=STEPS as u32).map(|i| 2 * i - 1).collect()
}

// ------------------------------------------------------------
// Frame rendering
// ------------------------------------------------------------
fn render_frame(t: &[f64], signal: &[f64], n: u32) -> Result<RgbaImage> {
    let fourier: Vec<f64> = t.iter().map(|&ti| fourier_partial_sum(ti, n)).collect();
    let sigma: Vec<f64> = t.iter().map(|&ti| sigma_partial_sum(ti, n)).collect();

    let mut buf = vec![255u8; (IMG_W * IMG_H * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (IMG_W, IMG_H)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(14)
            .caption(
                "Square Wave Approximation: Fourier vs Sigma",
                ("sans-serif", 32),
            )
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..2.0 * PI, -1.5..1.5)?;

        chart
            .configure_mesh()
            .x_desc("t")
            .y_desc("amplitude")
            .axis_desc_style(("sans-serif", 24))
            .label_style(("sans-serif", 18))
            .x_labels(8)
            .y_labels(7)
            .x_label_formatter(&|v| format!("{:.1}", v))
            .y_label_formatter(&|v| format!("{:.1}", v))
            .draw()?;

        chart
            .draw_series(LineSeries::new(
                t.iter().copied().zip(signal.iter().copied()),
                SQUARE_COLOR.stroke_width(3),
            ))?
            .label("Square wave")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 22, y)], SQUARE_COLOR.stroke_width(3)));

        chart
            .draw_series(LineSeries::new(
                t.iter().copied().zip(fourier.iter().copied()),
                FOURIER_COLOR.stroke_width(2),
            ))?
            .label(format!("Fourier series (N={})", n))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 22, y)], FOURIER_COLOR.stroke_width(2)));

        chart
            .draw_series(LineSeries::new(
                t.iter().copied().zip(sigma.iter().copied()),
                SIGMA_COLOR.stroke_width(2),
            ))?
            .label(format!("Sigma approximation (N={})", n))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 22, y)], SIGMA_COLOR.stroke_width(2)));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .label_font(("sans-serif", 20))
            .draw()?;

        root.present()?;
    }

    let mut frame = RgbaImage::new(IMG_W, IMG_H);
    for (dst, src) in frame.pixels_mut().zip(buf.chunks_exact(3)) {
        *dst = Rgba([src[0], src[1], src[2], 255]);
    }
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
        let name = frames_dir.join(format!("frame_{:03}.png", i));
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
// Overshoot log and summary plot
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

// Peak amplitude of both approximations over the truncation orders:
// the Fourier curve plateaus above 1 (Gibbs), the sigma curve climbs
// toward 1 from below.
fn save_overshoot_plot(
    filename: &Path,
    orders: &[f64],
    fourier_max: &[f64],
    sigma_max: &[f64],
) -> Result<()> {
    let (w, h) = (1600u32, 1200u32);

    let xmax = orders[orders.len() - 1];
    let mut ymin = f64::INFINITY;
    let mut ymax = f64::NEG_INFINITY;
    for v in fourier_max.iter().chain(sigma_max.iter()) {
        ymin = ymin.min(*v);
        ymax = ymax.max(*v);
    }
    let ypad = 0.05 * (ymax - ymin).max(1e-9);

    let root = BitMapBackend::new(filename, (w, h)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption("Peak Amplitude vs Truncation Order", ("sans-serif", 52))
        .x_label_area_size(90)
        .y_label_area_size(110)
        .build_cartesian_2d(0.0..xmax + 1.0, (ymin - ypad)..(ymax + ypad))?;

    chart
        .configure_mesh()
        .x_desc("truncation order N")
        .y_desc("max |series|")
        .axis_desc_style(("sans-serif", 40))
        .label_style(("sans-serif", 30))
        .x_labels(10)
        .y_labels(10)
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.2}", v))
        .bold_line_style(RGBColor(170, 170, 170).stroke_width(2))
        .light_line_style(RGBColor(225, 225, 225).stroke_width(1))
        .draw()?;

    // Unit amplitude reference.
    chart.draw_series(LineSeries::new(
        [(0.0, 1.0), (xmax + 1.0, 1.0)],
        RGBColor(140, 140, 140).stroke_width(2),
    ))?;

    chart
        .draw_series(LineSeries::new(
            orders.iter().copied().zip(fourier_max.iter().copied()),
            FOURIER_COLOR.stroke_width(3),
        ))?
        .label("Fourier peak")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 28, y)], FOURIER_COLOR.stroke_width(3)));

    chart
        .draw_series(LineSeries::new(
            orders.iter().copied().zip(sigma_max.iter().copied()),
            SIGMA_COLOR.stroke_width(3),
        ))?
        .label("Sigma peak")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 28, y)], SIGMA_COLOR.stroke_width(3)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .label_font(("sans-serif", 30))
        .draw()?;

    root.present()?;
    Ok(())
}

fn main() -> Result<()> {
    // ----------------------------
    // Output folders
    // ----------------------------
    let out_dir = PathBuf::from("output").join("square_wave_approx");
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
    // Target signal on the fixed grid
    // ----------------------------
    let t = sample_grid(SAMPLES);
    let signal: Vec<f64> = t.iter().map(|&ti| square_wave(ti)).collect();

    // ----------------------------
    // One frame per truncation order
    // ----------------------------
    let orders = frame_orders();
    let mut fourier_max = Vec::with_capacity(orders.len());
    let mut sigma_max = Vec::with_capacity(orders.len());

    for (i, &n) in orders.iter().enumerate() {
        let frame = render_frame(&t, &signal, n)?;
        let name = frames_dir.join(format!("frame_{:03}.png", i));
        frame
            .save(&name)
            .with_context(|| format!("Failed to save {}", name.display()))?;

        // Track peak amplitudes for the summary outputs.
        let fmax = t
            .iter()
            .map(|&ti| fourier_partial_sum(ti, n).abs())
            .fold(0.0f64, f64::max);
        let smax = t
            .iter()
            .map(|&ti| sigma_partial_sum(ti, n).abs())
            .fold(0.0f64, f64::max);
        fourier_max.push(fmax);
        sigma_max.push(smax);

        if i % 10 == 0 {
            println!(
                "Frame {}/{}  N={}  fourier_max={:.4}  sigma_max={:.4}",
                i,
                orders.len(),
                n,
                fmax,
                smax
            );
        }
    }

    // ----------------------------
    // Assemble GIF, then drop the staging frames
    // ----------------------------
    println!("Encoding GIF...");
    assemble_gif(&frames_dir, orders.len(), FRAME_DELAY_MS, Path::new(GIF_NAME))?;
    fs::remove_dir_all(&frames_dir).context("Failed to remove frames directory")?;

    // ----------------------------
    // Overshoot log + summary plot
    // ----------------------------
    println!("Saving overshoot log and plot...");
    let orders_f: Vec<f64> = orders.iter().map(|&n| n as f64).collect();
    write_csv(
        &out_dir.join("overshoot_log.csv"),
        &["n", "fourier_max", "sigma_max"],
        &[&orders_f[..], &fourier_max[..], &sigma_max[..]],
    )?;
    save_overshoot_plot(
        &out_dir.join("overshoot_vs_order.png"),
        &orders_f,
        &fourier_max,
        &sigma_max,
    )?;

    println!(
        "Done. Animation: {}  Log and plot: {}",
        GIF_NAME,
        out_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // Finer grid than the animation uses, to pin down the peaks.
    fn fine_grid() -> Vec<f64> {
        sample_grid(8000)
    }

    fn peak(f: impl Fn(f64) -> f64, grid: &[f64]) -> f64 {
        grid.iter().map(|&t| f(t).abs()).fold(0.0f64, f64::max)
    }

    #[test]
    fn fundamental_is_a_pure_sine() {
        // At N = 1 the partial sum is exactly (4/π)·sin t.
        for &t in fine_grid().iter() {
            assert_abs_diff_eq!(
                fourier_partial_sum(t, 1),
                (4.0 / PI) * t.sin(),
                epsilon = 1e-15
            );
        }
        assert_abs_diff_eq!(
            peak(|t| fourier_partial_sum(t, 1), &fine_grid()),
            4.0 / PI,
            epsilon = 1e-6
        );
    }

    #[test]
    fn gibbs_overshoot_persists() {
        // The Fourier peak overshoots the unit plateau by ~18% of the
        // half-amplitude (~9% of the full jump) and does not vanish as
        // N grows.
        let grid = fine_grid();
        for &n in &[9u32, 19, 39, 79] {
            let overshoot = peak(|t| fourier_partial_sum(t, n), &grid) - 1.0;
            assert!(
                overshoot > 0.17 && overshoot < 0.20,
                "overshoot {} out of band at N={}",
                overshoot,
                n
            );
        }
    }

    #[test]
    fn sigma_suppresses_overshoot() {
        // Fejér weighting keeps the sum inside the unit amplitude, and
        // its peak climbs toward 1 as the order grows.
        let grid = fine_grid();
        let p9 = peak(|t| sigma_partial_sum(t, 9), &grid);
        let p39 = peak(|t| sigma_partial_sum(t, 39), &grid);
        let p79 = peak(|t| sigma_partial_sum(t, 79), &grid);

        for &p in &[p9, p39, p79] {
            assert!(p <= 1.0 + 1e-9, "sigma peak {} exceeds unit amplitude", p);
        }
        assert!(p9 < p39 && p39 < p79, "sigma peak not increasing: {} {} {}", p9, p39, p79);
        assert!(p79 > 0.97, "sigma peak {} too far from 1 at N=79", p79);
    }

    #[test]
    fn sigma_equals_cesaro_average_of_partial_sums() {
        // The weights 1 - k/(N+1) are exactly the Cesàro average of the
        // partial sums S_0..S_N.
        let n = 7u32;
        for &t in sample_grid(200).iter() {
            let avg: f64 = (0..=n).map(|m| fourier_partial_sum(t, m)).sum::<f64>()
                / (n as f64 + 1.0);
            assert_abs_diff_eq!(sigma_partial_sum(t, n), avg, epsilon = 1e-12);
        }
    }

    #[test]
    fn even_order_collapses_to_preceding_odd() {
        // Only odd harmonics contribute, so an even order adds no term.
        for &t in sample_grid(50).iter() {
            assert_eq!(fourier_partial_sum(t, 8), fourier_partial_sum(t, 7));
        }
    }

    #[test]
    fn frame_order_schedule() {
        let orders = frame_orders();
        assert_eq!(orders.len(), STEPS);
        assert_eq!(orders[0], 1);
        assert_eq!(orders[orders.len() - 1], 79);
        assert!(orders.iter().all(|&n| n % 2 == 1));
        assert!(orders.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn frames_render_and_assemble() {
        let t = sample_grid(400);
        let signal: Vec<f64> = t.iter().map(|&ti| square_wave(ti)).collect();

        let dir = tempfile::tempdir().unwrap();
        for (i, &n) in [1u32, 3, 5].iter().enumerate() {
            let frame = render_frame(&t, &signal, n).unwrap();
            assert_eq!(frame.dimensions(), (IMG_W, IMG_H));
            frame
                .save(dir.path().join(format!("frame_{:03}.png", i)))
                .unwrap();
        }

        let gif = dir.path().join("out.gif");
        assemble_gif(dir.path(), 3, FRAME_DELAY_MS, &gif).unwrap();
        assert!(fs::metadata(&gif).unwrap().len() > 0);
    }
}
