use super::detection::Detection;

/// NMS voraz sobre todas las etiquetas a la vez.
///
/// Un candidato se descarta cuando su IoU con una caja ya aceptada es `>= iou_threshold`.
/// El resultado sale ordenado por score descendente; a igual score se respeta el orden de entrada.
pub fn suppress(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    // sort_by es estable; total_cmp da un orden total incluso con NaN
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    let mut remaining = detections;
    while !remaining.is_empty() {
        let best = remaining.remove(0);
        remaining.retain(|d| best.iou(d) < iou_threshold);
        kept.push(best);
    }
    kept
}
