use x86_64::VirtAddr;
use x86_64::structures::tss::TaskStateSegment;
use x86_64::structures::gdt::{GlobalDescriptorTable, Descriptor, SegmentSelector};
use lazy_static::lazy_static;

/// IST slot used by the double fault handler
pub const DOUBLE_FAULT_IST_INDEX: u16 = 0;

/// 20 KiB, enough for the fault handler's diagnostics
const FAULT_STACK_SIZE: usize = 4096 * 5;

static mut FAULT_STACK: [u8; FAULT_STACK_SIZE] = [0; FAULT_STACK_SIZE];

lazy_static! {
    static ref TSS: TaskStateSegment = {
        let mut tss = TaskStateSegment::new();
        let stack_start = VirtAddr::from_ptr(unsafe { core::ptr::addr_of!(FAULT_STACK) });
        // stacks grow down
        tss.interrupt_stack_table[DOUBLE_FAULT_IST_INDEX as usize] =
            stack_start + FAULT_STACK_SIZE as u64;
        tss
    };

    static ref GDT: (GlobalDescriptorTable, Selectors) = {
        let mut gdt = GlobalDescriptorTable::new();
        let code = gdt.append(Descriptor::kernel_code_segment());
        let tss = gdt.append(Descriptor::tss_segment(&TSS));
        (gdt, Selectors { code, tss })
    };
}

struct Selectors {
    code: SegmentSelector,
    tss: SegmentSelector,
}

/// Load the GDT and the TSS holding the double fault stack
pub fn init() {
    use x86_64::instructions::tables::load_tss;
    use x86_64::instructions::segmentation::{CS, Segment};

    GDT.0.load();
    unsafe {
        CS::set_reg(GDT.1.code);
        load_tss(GDT.1.tss);
    }
}
