/// loading, saving and running JSON simulation task files
pub mod task_loader;
