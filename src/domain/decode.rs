use ndarray::{ArrayView2, Axis, Ix2};
use tracing::warn;

use super::{
    detection::Detection,
    errors::{DomainError, DomainResult},
    model::{ImageSize, RawOutput},
};

const UNKNOWN_LABEL: &str = "object";

/// Convierte filas YOLO `[xc, yc, w, h, objectness, scores de clase..]` en detecciones normalizadas.
///
/// Un tensor con forma inesperada da una lista vacía y un aviso; un frame roto
/// no corta el stream.
pub fn decode(
    raw: &RawOutput,
    input_size: ImageSize,
    original_size: ImageSize,
    conf_threshold: f32,
    class_names: &[&str],
) -> Vec<Detection> {
    match try_decode(raw, input_size, original_size, conf_threshold, class_names) {
        Ok(detections) => detections,
        Err(e) => {
            warn!("⚠️ Discarding model output: {}", e);
            Vec::new()
        }
    }
}

fn try_decode(
    raw: &RawOutput,
    input_size: ImageSize,
    original_size: ImageSize,
    conf_threshold: f32,
    class_names: &[&str],
) -> DomainResult<Vec<Detection>> {
    if input_size.width == 0 || input_size.height == 0 {
        return Err(DomainError::MalformedInput("tamaño de entrada del modelo es cero".into()));
    }
    if original_size.width == 0 || original_size.height == 0 {
        return Err(DomainError::MalformedInput("tamaño de imagen es cero".into()));
    }

    let view = raw
        .view()
        .map_err(|e| DomainError::MalformedInput(format!("shape {:?}: {}", raw.shape, e)))?;
    let view = match view.ndim() {
        3 if view.shape()[0] == 1 => view.index_axis_move(Axis(0), 0),
        2 => view,
        _ => {
            return Err(DomainError::MalformedInput(format!(
                "se esperaba [N, 5+C] o [1, N, 5+C], llegó {:?}",
                raw.shape
            )))
        }
    };
    let rows: ArrayView2<f32> = view
        .into_dimensionality::<Ix2>()
        .map_err(|e| DomainError::MalformedInput(e.to_string()))?;
    if rows.ncols() < 6 {
        return Err(DomainError::MalformedInput(format!(
            "las filas necesitan al menos 6 columnas, llegaron {}",
            rows.ncols()
        )));
    }

    let orig_w = original_size.width as f32;
    let orig_h = original_size.height as f32;
    let sx = orig_w / input_size.width as f32;
    let sy = orig_h / input_size.height as f32;

    let mut detections = Vec::new();
    for row in rows.outer_iter() {
        let objectness = row[4];
        // NaN nunca supera el umbral.
        if !(objectness >= conf_threshold) {
            continue;
        }

        let Some((class_id, class_score)) = argmax(row.slice(ndarray::s![5..]).iter().copied())
        else {
            continue;
        };
        let score = objectness * class_score;
        if !(score >= conf_threshold) {
            continue;
        }

        let (xc, yc, w, h) = (row[0], row[1], row[2], row[3]);
        let x1 = (xc - w / 2.0) * sx;
        let y1 = (yc - h / 2.0) * sy;
        let x2 = (xc + w / 2.0) * sx;
        let y2 = (yc + h / 2.0) * sy;

        let xmin = (x1 / orig_w).clamp(0.0, 1.0);
        let ymin = (y1 / orig_h).clamp(0.0, 1.0);
        let xmax = (x2 / orig_w).clamp(0.0, 1.0);
        let ymax = (y2 / orig_h).clamp(0.0, 1.0);

        if !(xmax > xmin && ymax > ymin) {
            continue;
        }

        detections.push(Detection {
            label: class_names.get(class_id).unwrap_or(&UNKNOWN_LABEL).to_string(),
            score,
            xmin,
            ymin,
            xmax,
            ymax,
        });
    }

    Ok(detections)
}

/// Primer índice con el valor máximo; los NaN se ignoran.
fn argmax(values: impl Iterator<Item = f32>) -> Option<(usize, f32)> {
    values
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::COCO_CLASSES;

    const SIZE: ImageSize = ImageSize { width: 100, height: 100 };

    fn row(xc: f32, yc: f32, w: f32, h: f32, obj: f32, classes: &[f32]) -> Vec<f32> {
        let mut r = vec![xc, yc, w, h, obj];
        r.extend_from_slice(classes);
        r
    }

    fn tensor(rows: &[Vec<f32>]) -> RawOutput {
        let cols = rows[0].len();
        RawOutput::new(vec![1, rows.len(), cols], rows.concat())
    }

    #[test]
    fn decodes_center_box_into_normalized_corners() {
        let raw = tensor(&[row(30.0, 30.0, 40.0, 40.0, 0.95, &[0.1, 0.2, 0.9])]);
        let out = decode(&raw, SIZE, SIZE, 0.5, &COCO_CLASSES);

        assert_eq!(out.len(), 1);
        let d = &out[0];
        assert_eq!(d.label, "car");
        assert!((d.score - 0.855).abs() < 1e-5);
        assert!((d.xmin - 0.1).abs() < 1e-6);
        assert!((d.ymin - 0.1).abs() < 1e-6);
        assert!((d.xmax - 0.5).abs() < 1e-6);
        assert!((d.ymax - 0.5).abs() < 1e-6);
    }

    #[test]
    fn scales_x_and_y_independently() {
        // 320x240 model input, 640x480 frame: normalized result is unchanged.
        let raw = RawOutput::new(vec![1, 6], row(160.0, 120.0, 64.0, 48.0, 0.9, &[0.9]));
        let out = decode(&raw, ImageSize::new(320, 240), ImageSize::new(640, 480), 0.5, &["person"]);

        assert_eq!(out.len(), 1);
        assert!((out[0].xmin - 0.4).abs() < 1e-6);
        assert!((out[0].xmax - 0.6).abs() < 1e-6);
        assert!((out[0].ymin - 0.4).abs() < 1e-6);
        assert!((out[0].ymax - 0.6).abs() < 1e-6);
    }

    #[test]
    fn drops_low_objectness_and_low_final_score() {
        let raw = tensor(&[
            row(50.0, 50.0, 10.0, 10.0, 0.4, &[1.0]),
            row(50.0, 50.0, 10.0, 10.0, 0.8, &[0.6]),
            row(50.0, 50.0, 10.0, 10.0, 0.8, &[0.7]),
        ]);
        let out = decode(&raw, SIZE, SIZE, 0.5, &["thing"]);

        assert_eq!(out.len(), 1);
        assert!((out[0].score - 0.56).abs() < 1e-5);
    }

    #[test]
    fn clamps_to_unit_range_and_drops_degenerate_boxes() {
        let raw = tensor(&[
            row(0.0, 0.0, 40.0, 40.0, 0.9, &[0.9]),
            row(150.0, 150.0, 20.0, 20.0, 0.9, &[0.9]),
            row(50.0, 50.0, 0.0, 10.0, 0.9, &[0.9]),
        ]);
        let out = decode(&raw, SIZE, SIZE, 0.5, &["a"]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].xmin, 0.0);
        assert_eq!(out[0].ymin, 0.0);
        assert!((out[0].xmax - 0.2).abs() < 1e-6);
    }

    #[test]
    fn argmax_ties_pick_the_first_class() {
        let raw = tensor(&[row(50.0, 50.0, 10.0, 10.0, 0.9, &[0.8, 0.8])]);
        let out = decode(&raw, SIZE, SIZE, 0.5, &["first", "second"]);
        assert_eq!(out[0].label, "first");
    }

    #[test]
    fn unknown_class_index_falls_back_to_generic_label() {
        let raw = tensor(&[row(50.0, 50.0, 10.0, 10.0, 0.9, &[0.1, 0.9])]);
        let out = decode(&raw, SIZE, SIZE, 0.5, &["only"]);
        assert_eq!(out[0].label, UNKNOWN_LABEL);
    }

    #[test]
    fn malformed_shapes_decode_to_nothing() {
        let flat = RawOutput::new(vec![12], vec![0.9; 12]);
        let narrow = RawOutput::new(vec![2, 5], vec![0.9; 10]);
        let batched = RawOutput::new(vec![2, 1, 6], vec![0.9; 12]);
        let mismatched = RawOutput::new(vec![1, 3, 6], vec![0.9; 10]);

        for raw in [flat, narrow, batched, mismatched] {
            assert!(decode(&raw, SIZE, SIZE, 0.5, &["a"]).is_empty());
        }
        let ok = RawOutput::new(vec![1, 6], row(50.0, 50.0, 10.0, 10.0, 0.9, &[0.9]));
        assert!(decode(&ok, SIZE, ImageSize::new(0, 10), 0.5, &["a"]).is_empty());
    }
}
