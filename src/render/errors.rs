use std::panic::Location;

use log::error;

const FILTERS: [wgpu::ErrorFilter; 3] = [
    wgpu::ErrorFilter::Validation,
    wgpu::ErrorFilter::OutOfMemory,
    wgpu::ErrorFilter::Internal,
];

/// Captures device errors raised between `push` and `check`.
///
/// Errors are logged with the call site of `check` and never abort the
/// frame. A scope dropped without `check`, for example on an early return,
/// still pops and logs against the site that pushed it.
pub(crate) struct ErrorScope<'a> {
    device: &'a wgpu::Device,
    pushed_at: &'static Location<'static>,
    open: bool,
}

impl<'a> ErrorScope<'a> {
    #[track_caller]
    pub fn push(device: &'a wgpu::Device) -> Self {
        for filter in FILTERS {
            device.push_error_scope(filter);
        }
        Self {
            device,
            pushed_at: Location::caller(),
            open: true,
        }
    }

    /// Pops every scope and returns how many errors were reported.
    #[track_caller]
    pub fn check(mut self) -> usize {
        self.pop_all(Location::caller())
    }

    fn pop_all(&mut self, location: &Location<'_>) -> usize {
        self.open = false;
        let mut reported = 0;
        for _ in FILTERS {
            if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
                error!(
                    "{} | {}:{}: {err}",
                    error_kind(&err),
                    location.file(),
                    location.line()
                );
                reported += 1;
            }
        }
        reported
    }
}

impl Drop for ErrorScope<'_> {
    fn drop(&mut self) {
        if self.open {
            let pushed_at = self.pushed_at;
            self.pop_all(pushed_at);
        }
    }
}

fn error_kind(err: &wgpu::Error) -> &'static str {
    #[allow(unreachable_patterns)]
    match err {
        wgpu::Error::Validation { .. } => "VALIDATION",
        wgpu::Error::OutOfMemory { .. } => "OUT_OF_MEMORY",
        wgpu::Error::Internal { .. } => "INTERNAL",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Any adapter will do, including a software one; machines without one
    /// skip the GPU checks.
    fn headless_device() -> Option<wgpu::Device> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
                .ok()?;
        let (device, _queue) =
            pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).ok()?;
        Some(device)
    }

    fn invalid_buffer(device: &wgpu::Device) {
        // MAP_READ may only be paired with COPY_DST
        let _ = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("invalid-usage"),
            size: 16,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::VERTEX,
            mapped_at_creation: false,
        });
    }

    #[test]
    fn check_reports_validation_errors() {
        let Some(device) = headless_device() else {
            return;
        };
        let scope = ErrorScope::push(&device);
        invalid_buffer(&device);
        assert_eq!(scope.check(), 1);

        let scope = ErrorScope::push(&device);
        assert_eq!(scope.check(), 0);
    }

    #[test]
    fn dropped_scope_still_pops_its_errors() {
        let Some(device) = headless_device() else {
            return;
        };
        let outer = ErrorScope::push(&device);
        {
            let _inner = ErrorScope::push(&device);
            invalid_buffer(&device);
        }
        // the inner scope already consumed the error
        assert_eq!(outer.check(), 0);
    }
}
