pub mod detection_gateway;
