pub mod http_detection_gateway;
