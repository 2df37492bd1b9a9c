pub mod yolo_engine;
