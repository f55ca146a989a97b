//! Offline PNG rendering of acquired runs. Everything draws into an RGB
//! buffer first and is encoded at the end, so no display is required.

use plotters::prelude::*;

use crate::error::SystolicError;
use crate::leads::{Lead, WaveformSet, LEAD_COUNT};
use crate::spectrum::MagnitudeSpectrum;

/// Panel colors, one per derived lead.
pub const LEAD_COLORS: [RGBColor; LEAD_COUNT] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

#[derive(Clone, Copy, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: [RGBColor; LEAD_COUNT],
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 960,
            background: WHITE,
            palette: LEAD_COLORS,
        }
    }
}

/// Renders all six leads as a three-by-two grid of strip charts.
pub fn render_waveform_png(set: &WaveformSet, style: PlotStyle) -> Result<Vec<u8>, SystolicError> {
    if set.is_empty() {
        return Err(SystolicError::WaveformTooShort { len: 0 });
    }
    let rate_hz = set.sample_rate_hz();
    let duration = set.duration_secs();

    let mut raw = vec![0u8; style.width as usize * style.height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut raw, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let panels = root.split_evenly((3, 2));
        for (lead, panel) in Lead::ALL.into_iter().zip(panels.iter()) {
            let samples = set.lead_slice(lead);
            let (lo, hi) = padded_bounds(samples);
            let mut chart = ChartBuilder::on(panel)
                .caption(lead.label(), ("sans-serif", 18))
                .margin(8)
                .x_label_area_size(24)
                .y_label_area_size(48)
                .build_cartesian_2d(0.0..duration, lo..hi)?;
            chart
                .configure_mesh()
                .x_labels(5)
                .y_labels(4)
                .x_desc("s")
                .y_desc("mV")
                .draw()?;
            chart.draw_series(LineSeries::new(
                samples
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| (i as f64 / rate_hz, v)),
                style.palette[lead.index()],
            ))?;
        }
        root.present()?;
    }
    encode_png(&raw, style.width, style.height)
}

/// Renders per-lead magnitude spectra as one chart with a legend.
pub fn render_spectrum_png(
    spectrum: &MagnitudeSpectrum,
    style: PlotStyle,
) -> Result<Vec<u8>, SystolicError> {
    let frequencies = spectrum.frequencies_hz();
    if frequencies.len() < 2 {
        return Err(SystolicError::InvalidConfig(
            "spectrum has too few bins to plot".into(),
        ));
    }
    let top = Lead::ALL
        .into_iter()
        .flat_map(|lead| spectrum.magnitudes(lead).iter().copied())
        .fold(0.0f64, f64::max);
    let top = if top > 0.0 { top * 1.1 } else { 1.0 };
    let span = frequencies[frequencies.len() - 1];

    let mut raw = vec![0u8; style.width as usize * style.height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut raw, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .caption("Lead spectra", ("sans-serif", 22))
            .margin(10)
            .x_label_area_size(32)
            .y_label_area_size(56)
            .build_cartesian_2d(0.0..span, 0.0..top)?;
        chart
            .configure_mesh()
            .x_desc("Hz")
            .y_desc("magnitude")
            .draw()?;
        for lead in Lead::ALL {
            let color = style.palette[lead.index()];
            chart
                .draw_series(LineSeries::new(
                    frequencies
                        .iter()
                        .copied()
                        .zip(spectrum.magnitudes(lead).iter().copied()),
                    color,
                ))?
                .label(lead.label())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
        }
        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .draw()?;
        root.present()?;
    }
    encode_png(&raw, style.width, style.height)
}

/// Symmetric padding around the observed range, with a fixed fallback for
/// flat traces so the axis never collapses.
fn padded_bounds(samples: &[f64]) -> (f64, f64) {
    let lo = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(hi - lo).is_finite() || hi - lo < 1e-9 {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

fn encode_png(raw: &[u8], width: u32, height: u32) -> Result<Vec<u8>, SystolicError> {
    let image = image::ImageBuffer::<image::Rgb<u8>, _>::from_raw(width, height, raw.to_vec())
        .ok_or_else(|| SystolicError::Plot("rgb buffer does not match its dimensions".into()))?;
    let mut encoded = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Png)?;
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::SpectrumBuilder;
    use ndarray::Array2;
    use std::f64::consts::PI;

    const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];

    fn small_style() -> PlotStyle {
        PlotStyle {
            width: 320,
            height: 240,
            ..PlotStyle::default()
        }
    }

    fn test_set() -> WaveformSet {
        let count = 256;
        let mut samples = Array2::<f64>::zeros((LEAD_COUNT, count));
        for lead in 0..LEAD_COUNT {
            for col in 0..count {
                samples[[lead, col]] =
                    (lead as f64 + 1.0) * (2.0 * PI * 5.0 * col as f64 / 200.0).sin();
            }
        }
        WaveformSet::from_samples(samples, 200.0).unwrap()
    }

    #[test]
    fn waveform_grid_encodes_as_png() {
        let png = render_waveform_png(&test_set(), small_style()).unwrap();
        assert!(png.len() > PNG_MAGIC.len());
        assert_eq!(&png[..4], &PNG_MAGIC);
    }

    #[test]
    fn flat_traces_still_render() {
        let samples = Array2::<f64>::zeros((LEAD_COUNT, 64));
        let set = WaveformSet::from_samples(samples, 200.0).unwrap();
        let png = render_waveform_png(&set, small_style()).unwrap();
        assert_eq!(&png[..4], &PNG_MAGIC);
    }

    #[test]
    fn empty_set_is_rejected() {
        let set = WaveformSet::from_samples(Array2::<f64>::zeros((LEAD_COUNT, 0)), 200.0).unwrap();
        assert!(matches!(
            render_waveform_png(&set, small_style()),
            Err(SystolicError::WaveformTooShort { len: 0 })
        ));
    }

    #[test]
    fn spectrum_chart_encodes_as_png() {
        let spectrum = SpectrumBuilder::with_size(256).unwrap().compute(&test_set());
        let png = render_spectrum_png(&spectrum, small_style()).unwrap();
        assert_eq!(&png[..4], &PNG_MAGIC);
    }
}
