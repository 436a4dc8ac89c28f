pub mod authorino_controller;
