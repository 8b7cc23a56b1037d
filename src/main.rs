fn main() {
    kitti_dataset::cli::run();
}
